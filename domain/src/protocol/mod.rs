//! Messages exchanged with the native engine.
//!
//! - **Requests**: client → engine, wrapped in a [`RequestEnvelope`] with a
//!   [`CorrelationToken`]
//! - **Responses**: engine → client, echoing the token
//! - **Events**: engine → client, pushed asynchronously and addressed by
//!   session handle

pub mod event;
pub mod request;
pub mod response;
pub mod token;

pub use event::Event;
pub use request::{HistoryFilter, Request, RequestEnvelope, TransmitTarget};
pub use response::{Response, ResponseBody};
pub use token::CorrelationToken;

use serde::{Deserialize, Serialize};

/// An inbound message drained from the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Message {
    Event(Event),
    Response(Response),
}

impl Message {
    /// Short name used in logs.
    pub fn describe(&self) -> String {
        match self {
            Message::Event(event) => format!("event {}", event.kind()),
            Message::Response(response) => format!(
                "response {} (status {})",
                response.token, response.status_code
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conference::LoginState;
    use crate::identity::{AccountHandle, AccountId};

    fn handle() -> AccountHandle {
        AccountHandle::for_account(&AccountId::new("acme", "alice", "d.example", None).unwrap())
    }

    #[test]
    fn test_event_routing_keys() {
        let event = Event::LoginStateChanged {
            account_handle: handle(),
            state: LoginState::LoggedIn,
            status_code: 0,
        };
        assert_eq!(event.account_handle(), Some(&handle()));
        assert!(event.session_handle().is_none());
        assert_eq!(event.kind(), "login_state_changed");
    }

    #[test]
    fn test_message_serde_tagging() {
        let msg = Message::Response(Response::ok(CorrelationToken::new(7)));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"], "response");
        assert_eq!(json["body"]["token"], 7);
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_describe() {
        let msg = Message::Response(Response::error(CorrelationToken::new(3), 1005, "denied"));
        assert_eq!(msg.describe(), "response #3 (status 1005)");
    }
}
