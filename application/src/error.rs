//! Application error types
//!
//! [`ClientError`] is the single error surfaced through every
//! [`Completion`](crate::completion::Completion). It is `Clone` so that a
//! completed-with-error future can hand the same error to every reader.

use crate::ports::transport::TransportError;
use std::time::Duration;
use thiserror::Error;
use voxlink_domain::{CorrelationToken, DomainError};

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while driving login and channel sessions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The backend reported a nonzero status code.
    #[error("Backend status {code}{}", backend_suffix(.token, .message))]
    BackendStatus {
        code: i32,
        token: Option<CorrelationToken>,
        message: Option<String>,
    },

    /// A caller-side deadline expired before the backend answered.
    #[error("{operation} timed out after {deadline:?}")]
    Timeout {
        operation: &'static str,
        deadline: Duration,
    },

    /// The operation is not valid in the current state. Raised before any
    /// request is sent.
    #[error("Invalid state: expected {expected}, was {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("Invalid argument: {0}")]
    Argument(String),

    /// The caller stopped waiting, or the owning session went away.
    #[error("Canceled: {0}")]
    Canceled(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Token provider error: {0}")]
    Token(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

fn backend_suffix(token: &Option<CorrelationToken>, message: &Option<String>) -> String {
    let mut suffix = String::new();
    if let Some(token) = token {
        suffix.push_str(&format!(" for request {}", token));
    }
    if let Some(message) = message {
        suffix.push_str(&format!(": {}", message));
    }
    suffix
}

impl ClientError {
    pub fn backend(code: i32, token: Option<CorrelationToken>, message: Option<String>) -> Self {
        ClientError::BackendStatus {
            code,
            token,
            message,
        }
    }

    pub fn invalid_state(expected: impl ToString, actual: impl ToString) -> Self {
        ClientError::InvalidState {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn timeout(operation: &'static str, deadline: Duration) -> Self {
        ClientError::Timeout {
            operation,
            deadline,
        }
    }

    /// Check if this error represents an expired deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    /// Check if this error represents a cancellation
    pub fn is_canceled(&self) -> bool {
        matches!(self, ClientError::Canceled(_))
    }

    /// Backend status code, if this error came from the backend.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            ClientError::BackendStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}
