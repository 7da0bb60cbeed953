//! Validation for the dot-separated segments of account and channel URIs.
//!
//! Issuers, names and environment ids are joined with `.` in the URI form,
//! so the separator characters (`.`, `@`, `!`, `:`) are rejected here.

use super::error::DomainError;

/// Longest segment the backend accepts.
pub const MAX_SEGMENT_LEN: usize = 63;

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '=' | '+' | '-' | '_' | '~' | '(' | ')' | '%')
}

/// Validate an issuer, account name, channel name or environment id.
pub fn validate_segment(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::InvalidName {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if value.len() > MAX_SEGMENT_LEN {
        return Err(DomainError::InvalidName {
            field,
            reason: format!("longer than {} characters", MAX_SEGMENT_LEN),
        });
    }
    if let Some(bad) = value.chars().find(|c| !is_allowed(*c)) {
        return Err(DomainError::InvalidName {
            field,
            reason: format!("character '{}' is not allowed", bad),
        });
    }
    Ok(())
}

/// Validate a backend domain (host name). Dots are allowed here.
pub fn validate_domain(value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::InvalidName {
            field: "domain",
            reason: "must not be empty".to_string(),
        });
    }
    if value
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '.' || c == '-'))
    {
        return Err(DomainError::InvalidName {
            field: "domain",
            reason: "must be a host name".to_string(),
        });
    }
    Ok(())
}
