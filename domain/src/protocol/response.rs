//! Responses from the native engine.

use super::token::CorrelationToken;
use serde::{Deserialize, Serialize};

/// Payload of a successful response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBody {
    #[default]
    Empty,
    /// The backend accepted a history query and will stream its messages
    /// under this id.
    HistoryQueryStarted { query_id: String },
}

/// Response to a previously issued request, matched by `token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub token: CorrelationToken,
    /// Zero on success.
    pub status_code: i32,
    pub status_text: Option<String>,
    #[serde(default)]
    pub body: ResponseBody,
}

impl Response {
    pub fn ok(token: CorrelationToken) -> Self {
        Self::with_body(token, ResponseBody::Empty)
    }

    pub fn with_body(token: CorrelationToken, body: ResponseBody) -> Self {
        Self {
            token,
            status_code: 0,
            status_text: None,
            body,
        }
    }

    pub fn error(token: CorrelationToken, status_code: i32, status_text: impl Into<String>) -> Self {
        Self {
            token,
            status_code,
            status_text: Some(status_text.into()),
            body: ResponseBody::Empty,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 0
    }
}
