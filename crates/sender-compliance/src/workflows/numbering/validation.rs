use super::domain::{NumberingKind, ProviderId};

const TOLL_FREE_NPAS: [&str; 7] = ["800", "833", "844", "855", "866", "877", "888"];

/// Field-level rule violation; the field name is always carried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldViolation {
    #[error("{field} exceeds {max} characters (got {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
    #[error("did `{value}` is not a valid {kind} number: {reason}")]
    InvalidDid {
        value: String,
        kind: &'static str,
        reason: &'static str,
    },
    #[error("provider {provider:?} does not serve {kind} records")]
    ProviderKindMismatch {
        provider: ProviderId,
        kind: &'static str,
    },
}

impl FieldViolation {
    pub fn field(&self) -> &'static str {
        match self {
            FieldViolation::TooLong { field, .. } => field,
            FieldViolation::InvalidDid { .. } => "did",
            FieldViolation::ProviderKindMismatch { .. } => "provider_id",
        }
    }
}

/// Character-count check; counts Unicode scalar values rather than bytes.
pub fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), FieldViolation> {
    let actual = value.chars().count();
    if actual > max {
        return Err(FieldViolation::TooLong { field, max, actual });
    }
    Ok(())
}

/// Canonical DID form: blank means "no DID", formatting characters are dropped, and a bare
/// ten-digit number gains the `+1` country code.
pub fn normalize_did(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let plus = trimmed.starts_with('+');
    let digits: String = trimmed
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '-' | '(' | ')' | '.' | '+'))
        .collect();

    Some(if plus {
        format!("+{digits}")
    } else if digits.len() == 10 {
        format!("+1{digits}")
    } else if digits.len() == 11 && digits.starts_with('1') {
        format!("+{digits}")
    } else {
        digits
    })
}

/// Validates an already-normalized DID against the numbering plan rules for `kind`.
pub fn validate_did(kind: NumberingKind, did: &str) -> Result<(), FieldViolation> {
    let invalid = |reason| FieldViolation::InvalidDid {
        value: did.to_string(),
        kind: kind.label(),
        reason,
    };

    let national = did
        .strip_prefix("+1")
        .ok_or_else(|| invalid("expected a +1 number"))?;
    if national.len() != 10 || !national.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid("expected ten digits after +1"));
    }

    let npa = &national[..3];
    if matches!(npa.as_bytes()[0], b'0' | b'1') {
        return Err(invalid("area code cannot start with 0 or 1"));
    }
    let toll_free = TOLL_FREE_NPAS.contains(&npa);
    match kind {
        NumberingKind::TollFree if !toll_free => Err(invalid("area code is not toll-free")),
        NumberingKind::TenDlc if toll_free => Err(invalid("toll-free area code on a 10DLC record")),
        _ => Ok(()),
    }
}
