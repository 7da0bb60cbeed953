//! Domain error types

use thiserror::Error;

/// Domain-level errors
///
/// Raised while building or parsing identities and other value objects.
/// These never cross the native engine boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid {field}: {reason}")]
    InvalidName { field: &'static str, reason: String },

    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Invalid positional properties: {0}")]
    InvalidPositionalProperties(String),

    #[error("Positional properties are only valid for positional channels")]
    PropertiesOnNonPositionalChannel,
}

impl DomainError {
    pub(crate) fn invalid_uri(uri: &str, reason: impl Into<String>) -> Self {
        DomainError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }

    /// Check if this error came from parsing a URI string
    pub fn is_uri_error(&self) -> bool {
        matches!(self, DomainError::InvalidUri { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_name_display() {
        let error = DomainError::InvalidName {
            field: "issuer",
            reason: "must not be empty".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid issuer: must not be empty");
    }

    #[test]
    fn test_is_uri_error_check() {
        assert!(DomainError::invalid_uri("x", "nope").is_uri_error());
        assert!(!DomainError::PropertiesOnNonPositionalChannel.is_uri_error());
    }
}
