//! Literal token substitution shared by SMS sample copies and brief documents.
//!
//! Tokens are delimiter-wrapped names such as `[brand]` or `{{did}}`. Matching is exact and
//! case-sensitive, unknown tokens are left untouched, and substitution happens in a single pass
//! so a substituted value is never expanded again.

use std::collections::BTreeMap;

/// Opening/closing markers that wrap a token name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    open: &'static str,
    close: &'static str,
}

impl Delimiters {
    pub const fn new(open: &'static str, close: &'static str) -> Self {
        Self { open, close }
    }

    /// `[token]`, used by SMS sample templates.
    pub const fn square() -> Self {
        Self::new("[", "]")
    }

    /// `{{token}}`, used by brief document templates.
    pub const fn braces() -> Self {
        Self::new("{{", "}}")
    }

    pub const fn open(&self) -> &'static str {
        self.open
    }

    pub const fn close(&self) -> &'static str {
        self.close
    }
}

/// How bound values are encoded before they are spliced into the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueEscape {
    #[default]
    None,
    Xml,
}

/// Flat token → value table. A token bound to "nothing" substitutes as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    values: BTreeMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        self.values.insert(token.into(), value.into());
    }

    /// Bind `token`, treating a missing value as the empty string.
    pub fn insert_opt<V: Into<String>>(&mut self, token: impl Into<String>, value: Option<V>) {
        let value = value.map(Into::into).unwrap_or_default();
        self.values.insert(token.into(), value);
    }

    /// Bind `token` to the empty string unless it already has a value.
    pub fn insert_default(&mut self, token: impl Into<String>) {
        self.values.entry(token.into()).or_default();
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.values.get(token).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.values.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Bindings
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(token, value)| (token.into(), value.into()))
            .collect();
        Self { values }
    }
}

/// Stateless substitution engine parameterized by delimiter convention and value escaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderEngine {
    delimiters: Delimiters,
    escape: ValueEscape,
}

impl PlaceholderEngine {
    pub const fn new(delimiters: Delimiters) -> Self {
        Self {
            delimiters,
            escape: ValueEscape::None,
        }
    }

    pub const fn with_escape(mut self, escape: ValueEscape) -> Self {
        self.escape = escape;
        self
    }

    /// Square-bracket tokens, values inserted verbatim.
    pub const fn plain_text() -> Self {
        Self::new(Delimiters::square())
    }

    /// Brace tokens, values XML-escaped for document bodies.
    pub const fn document() -> Self {
        Self::new(Delimiters::braces()).with_escape(ValueEscape::Xml)
    }

    pub const fn delimiters(&self) -> Delimiters {
        self.delimiters
    }

    pub fn substitute(&self, template: &str, bindings: &Bindings) -> String {
        let Delimiters { open, close } = self.delimiters;
        let mut output = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find(open) {
            output.push_str(&rest[..start]);
            let after_open = &rest[start + open.len()..];

            let bound = after_open.find(close).and_then(|end| {
                let name = &after_open[..end];
                bindings
                    .get(name)
                    .filter(|_| !name.is_empty())
                    .map(|value| (value, end))
            });

            match bound {
                Some((value, end)) => {
                    self.push_value(&mut output, value);
                    rest = &after_open[end + close.len()..];
                }
                None => {
                    output.push_str(open);
                    rest = after_open;
                }
            }
        }

        output.push_str(rest);
        output
    }

    /// Distinct token names present in `template`, in order of first appearance.
    pub fn tokens<'t>(&self, template: &'t str) -> Vec<&'t str> {
        let Delimiters { open, close } = self.delimiters;
        let mut found: Vec<&'t str> = Vec::new();
        let mut rest = template;

        while let Some(start) = rest.find(open) {
            let after_open = &rest[start + open.len()..];
            let Some(end) = after_open.find(close) else {
                break;
            };
            let name = &after_open[..end];
            if is_token_name(name) {
                if !found.contains(&name) {
                    found.push(name);
                }
                rest = &after_open[end + close.len()..];
            } else {
                rest = after_open;
            }
        }

        found
    }

    /// Tokens in `template` that `bindings` would leave verbatim.
    pub fn unresolved<'t>(&self, template: &'t str, bindings: &Bindings) -> Vec<&'t str> {
        self.tokens(template)
            .into_iter()
            .filter(|token| !bindings.contains(token))
            .collect()
    }

    fn push_value(&self, output: &mut String, value: &str) {
        match self.escape {
            ValueEscape::None => output.push_str(value),
            ValueEscape::Xml => push_xml_escaped(output, value),
        }
    }
}

impl Default for PlaceholderEngine {
    fn default() -> Self {
        Self::plain_text()
    }
}

/// Token names are short identifiers; anything else between delimiters is ordinary text.
pub(crate) fn is_token_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

fn push_xml_escaped(output: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&apos;"),
            other => output.push(other),
        }
    }
}
