use super::FinalizedSamples;

/// Split a free-text completion into exactly three sample copies.
///
/// Blank lines and heading lines (ending in `:`) are skipped, list markers and wrapping quotes
/// are stripped. Any slot the completion does not fill takes the matching `fallback` entry.
pub fn parse_sample_copies(completion: &str, fallback: &[String; 3]) -> FinalizedSamples {
    let mut lines = completion
        .lines()
        .map(clean_line)
        .filter(|line| !line.is_empty() && !line.ends_with(':'));

    let mut slot = |index: usize| {
        lines
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| fallback[index].clone())
    };

    FinalizedSamples {
        copy1: slot(0),
        copy2: slot(1),
        copy3: slot(2),
    }
}

fn clean_line(line: &str) -> &str {
    let line = strip_list_marker(line.trim());
    strip_quotes(line).trim()
}

fn strip_list_marker(line: &str) -> &str {
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim_start();
        }
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 || digits > 2 {
        return line;
    }
    let rest = &line[digits..];
    match rest.chars().next() {
        Some('.' | ')' | ':') => rest[1..].trim_start(),
        _ => line,
    }
}

fn strip_quotes(line: &str) -> &str {
    let quoted = (line.starts_with('"') && line.ends_with('"'))
        || (line.starts_with('“') && line.ends_with('”'));
    if quoted && line.chars().count() >= 2 {
        let mut chars = line.chars();
        chars.next();
        chars.next_back();
        chars.as_str()
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback() -> [String; 3] {
        [
            "Hi Acme!".to_string(),
            "Visit acme.ly".to_string(),
            "Thanks".to_string(),
        ]
    }

    #[test]
    fn takes_three_plain_lines() {
        let copies = parse_sample_copies("One\nTwo\nThree\nFour", &fallback());
        assert_eq!(copies.copy1, "One");
        assert_eq!(copies.copy2, "Two");
        assert_eq!(copies.copy3, "Three");
    }

    #[test]
    fn missing_lines_fall_back_per_slot() {
        let copies = parse_sample_copies("First rewrite\n\nSecond rewrite\n", &fallback());
        assert_eq!(copies.copy1, "First rewrite");
        assert_eq!(copies.copy2, "Second rewrite");
        assert_eq!(copies.copy3, "Thanks");
    }

    #[test]
    fn strips_numbering_bullets_quotes_and_headings() {
        let completion = "Here are your messages:\n1. \"Hi from Acme!\"\n2) - not a bullet\n- “Reply STOP to opt out”";
        let copies = parse_sample_copies(completion, &fallback());
        assert_eq!(copies.copy1, "Hi from Acme!");
        assert_eq!(copies.copy2, "- not a bullet");
        assert_eq!(copies.copy3, "Reply STOP to opt out");
    }

    #[test]
    fn keeps_leading_numbers_that_are_not_markers() {
        let copies = parse_sample_copies("2024 deals are here", &fallback());
        assert_eq!(copies.copy1, "2024 deals are here");
        assert_eq!(copies.copy2, "Visit acme.ly");
    }
}
