//! Events pushed by the native engine.
//!
//! [`Event`] is a closed enum: every session matches it exhaustively, so a
//! new event kind is a compile-time-checked change.

use crate::conference::{
    ChannelTextMessage, ConnectionRecoveryState, ConnectionState, DirectMessage, LoginState,
    ParticipantUpdate, PresenceStatus, TranscribedMessage,
};
use crate::identity::{AccountHandle, ParticipantHandle, SessionHandle};
use serde::{Deserialize, Serialize};

/// An asynchronous event from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    LoginStateChanged {
        account_handle: AccountHandle,
        state: LoginState,
        /// Nonzero when the transition is the result of a failure.
        status_code: i32,
    },
    ConnectionRecoveryChanged {
        account_handle: AccountHandle,
        state: ConnectionRecoveryState,
    },
    SessionAdded {
        account_handle: AccountHandle,
        session_handle: SessionHandle,
        channel_uri: String,
    },
    SessionRemoved {
        account_handle: AccountHandle,
        session_handle: SessionHandle,
        status_code: i32,
    },
    MediaStreamUpdated {
        session_handle: SessionHandle,
        state: ConnectionState,
        status_code: i32,
    },
    TextStreamUpdated {
        session_handle: SessionHandle,
        state: ConnectionState,
        status_code: i32,
    },
    ParticipantAdded {
        session_handle: SessionHandle,
        participant_handle: ParticipantHandle,
        account_uri: String,
        display_name: Option<String>,
        is_self: bool,
    },
    ParticipantUpdated {
        session_handle: SessionHandle,
        participant_handle: ParticipantHandle,
        update: ParticipantUpdate,
    },
    ParticipantRemoved {
        session_handle: SessionHandle,
        participant_handle: ParticipantHandle,
    },
    ChannelMessage {
        session_handle: SessionHandle,
        message: ChannelTextMessage,
    },
    TranscribedMessage {
        session_handle: SessionHandle,
        message: TranscribedMessage,
    },
    HistoryMessage {
        session_handle: SessionHandle,
        query_id: String,
        message: ChannelTextMessage,
    },
    HistoryQueryEnd {
        session_handle: SessionHandle,
        query_id: String,
        status_code: i32,
    },
    DirectMessage {
        account_handle: AccountHandle,
        message: DirectMessage,
    },
    PresenceUpdated {
        account_handle: AccountHandle,
        account_uri: String,
        status: PresenceStatus,
        custom_message: Option<String>,
    },
    SubscriptionRequest {
        account_handle: AccountHandle,
        requester_uri: String,
    },
}

impl Event {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::LoginStateChanged { .. } => "login_state_changed",
            Event::ConnectionRecoveryChanged { .. } => "connection_recovery_changed",
            Event::SessionAdded { .. } => "session_added",
            Event::SessionRemoved { .. } => "session_removed",
            Event::MediaStreamUpdated { .. } => "media_stream_updated",
            Event::TextStreamUpdated { .. } => "text_stream_updated",
            Event::ParticipantAdded { .. } => "participant_added",
            Event::ParticipantUpdated { .. } => "participant_updated",
            Event::ParticipantRemoved { .. } => "participant_removed",
            Event::ChannelMessage { .. } => "channel_message",
            Event::TranscribedMessage { .. } => "transcribed_message",
            Event::HistoryMessage { .. } => "history_message",
            Event::HistoryQueryEnd { .. } => "history_query_end",
            Event::DirectMessage { .. } => "direct_message",
            Event::PresenceUpdated { .. } => "presence_updated",
            Event::SubscriptionRequest { .. } => "subscription_request",
        }
    }

    /// The login-session handle this event is addressed to, if any.
    pub fn account_handle(&self) -> Option<&AccountHandle> {
        match self {
            Event::LoginStateChanged { account_handle, .. }
            | Event::ConnectionRecoveryChanged { account_handle, .. }
            | Event::SessionAdded { account_handle, .. }
            | Event::SessionRemoved { account_handle, .. }
            | Event::DirectMessage { account_handle, .. }
            | Event::PresenceUpdated { account_handle, .. }
            | Event::SubscriptionRequest { account_handle, .. } => Some(account_handle),
            _ => None,
        }
    }

    /// The channel-session handle this event is addressed to, if any.
    pub fn session_handle(&self) -> Option<&SessionHandle> {
        match self {
            Event::SessionAdded { session_handle, .. }
            | Event::SessionRemoved { session_handle, .. }
            | Event::MediaStreamUpdated { session_handle, .. }
            | Event::TextStreamUpdated { session_handle, .. }
            | Event::ParticipantAdded { session_handle, .. }
            | Event::ParticipantUpdated { session_handle, .. }
            | Event::ParticipantRemoved { session_handle, .. }
            | Event::ChannelMessage { session_handle, .. }
            | Event::TranscribedMessage { session_handle, .. }
            | Event::HistoryMessage { session_handle, .. }
            | Event::HistoryQueryEnd { session_handle, .. } => Some(session_handle),
            _ => None,
        }
    }
}
