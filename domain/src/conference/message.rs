//! Text payloads: channel messages, transcriptions, directed messages and
//! presence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A text message posted to a channel (live or from history).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTextMessage {
    /// Backend-assigned id, unique per channel.
    pub id: String,
    /// Sender account URI with any resource tag stripped.
    pub sender_uri: String,
    pub sender_display_name: Option<String>,
    pub text: String,
    pub language: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub from_self: bool,
}

/// Speech-to-text output for one utterance in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscribedMessage {
    pub speaker_uri: String,
    pub text: String,
    pub language: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub from_self: bool,
}

/// A one-to-one text message addressed to the local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    pub sender_uri: String,
    pub text: String,
    pub language: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Presence of a subscribed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    #[default]
    Unavailable,
    Available,
    Away,
    ExtendedAway,
    DoNotDisturb,
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PresenceStatus::Unavailable => "unavailable",
            PresenceStatus::Available => "available",
            PresenceStatus::Away => "away",
            PresenceStatus::ExtendedAway => "extended_away",
            PresenceStatus::DoNotDisturb => "do_not_disturb",
        };
        f.write_str(s)
    }
}

/// Latest presence reported for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub status: PresenceStatus,
    pub message: Option<String>,
}

/// Sort messages oldest first, keeping the relative order of equal
/// timestamps.
pub fn sort_chronologically(messages: &mut [ChannelTextMessage]) {
    messages.sort_by_key(|m| m.timestamp);
}
