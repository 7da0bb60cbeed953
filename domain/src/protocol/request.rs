//! Requests issued to the native engine.
//!
//! Every request travels inside a [`RequestEnvelope`] that carries the
//! correlation token the backend must echo in its [`Response`](super::Response).

use super::token::CorrelationToken;
use crate::identity::{AccountHandle, SessionHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Target of the set-transmission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmitTarget {
    None,
    Session(SessionHandle),
    All,
}

/// Filter for a chat-history query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Only messages at or after this instant.
    pub time_start: Option<DateTime<Utc>>,
    /// Only messages before this instant.
    pub time_end: Option<DateTime<Utc>>,
    pub search_text: Option<String>,
    /// Only messages from this account URI.
    pub participant_uri: Option<String>,
}

/// A request understood by the native engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Login {
        account_handle: AccountHandle,
        access_token: String,
        display_name: Option<String>,
    },
    Logout {
        account_handle: AccountHandle,
    },
    JoinChannel {
        account_handle: AccountHandle,
        session_handle: SessionHandle,
        channel_uri: String,
        connect_audio: bool,
        connect_text: bool,
        access_token: String,
    },
    LeaveChannel {
        session_handle: SessionHandle,
    },
    SetTransmission {
        account_handle: AccountHandle,
        target: TransmitTarget,
    },
    SendChannelMessage {
        session_handle: SessionHandle,
        text: String,
        language: Option<String>,
    },
    SetTranscription {
        session_handle: SessionHandle,
        enabled: bool,
        access_token: String,
    },
    MuteParticipantForAll {
        session_handle: SessionHandle,
        participant_uri: String,
        muted: bool,
        access_token: String,
    },
    SetLocalMute {
        session_handle: SessionHandle,
        participant_uri: String,
        muted: bool,
    },
    UpdatePosition {
        session_handle: SessionHandle,
        speaker: [f32; 3],
        listener: [f32; 3],
        forward: [f32; 3],
        up: [f32; 3],
    },
    HistoryQuery {
        session_handle: SessionHandle,
        max_messages: u32,
        filter: HistoryFilter,
    },
    SendDirectMessage {
        account_handle: AccountHandle,
        recipient_uri: String,
        text: String,
        language: Option<String>,
    },
    AddAllowed {
        account_handle: AccountHandle,
        account_uri: String,
    },
    RemoveAllowed {
        account_handle: AccountHandle,
        account_uri: String,
    },
    AddSubscription {
        account_handle: AccountHandle,
        account_uri: String,
    },
    RemoveSubscription {
        account_handle: AccountHandle,
        account_uri: String,
    },
    AddBlocked {
        account_handle: AccountHandle,
        account_uri: String,
    },
    RemoveBlocked {
        account_handle: AccountHandle,
        account_uri: String,
    },
}

impl Request {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Login { .. } => "login",
            Request::Logout { .. } => "logout",
            Request::JoinChannel { .. } => "join_channel",
            Request::LeaveChannel { .. } => "leave_channel",
            Request::SetTransmission { .. } => "set_transmission",
            Request::SendChannelMessage { .. } => "send_channel_message",
            Request::SetTranscription { .. } => "set_transcription",
            Request::MuteParticipantForAll { .. } => "mute_participant_for_all",
            Request::SetLocalMute { .. } => "set_local_mute",
            Request::UpdatePosition { .. } => "update_position",
            Request::HistoryQuery { .. } => "history_query",
            Request::SendDirectMessage { .. } => "send_direct_message",
            Request::AddAllowed { .. } => "add_allowed",
            Request::RemoveAllowed { .. } => "remove_allowed",
            Request::AddSubscription { .. } => "add_subscription",
            Request::RemoveSubscription { .. } => "remove_subscription",
            Request::AddBlocked { .. } => "add_blocked",
            Request::RemoveBlocked { .. } => "remove_blocked",
        }
    }
}

/// A request paired with its correlation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub token: CorrelationToken,
    pub request: Request,
}

impl RequestEnvelope {
    pub fn new(token: CorrelationToken, request: Request) -> Self {
        Self { token, request }
    }
}
