//! State enums for login and channel sessions.
//!
//! # Login
//!
//! ```text
//! LoggedOut ──> LoggingIn ──> LoggedIn ──> LoggingOut ──> LoggedOut
//!                  │                                          ▲
//!                  └──────────── (error / timeout) ───────────┘
//! ```
//!
//! # Channel axes
//!
//! Audio, text and the overall channel each move through
//! `Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected`.

use crate::identity::ChannelId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a login session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginState {
    #[default]
    LoggedOut,
    LoggingIn,
    LoggedIn,
    LoggingOut,
}

impl LoginState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginState::LoggedOut => "logged_out",
            LoginState::LoggingIn => "logging_in",
            LoginState::LoggedIn => "logged_in",
            LoginState::LoggingOut => "logging_out",
        }
    }
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of the transport beneath a login session.
///
/// Observational only: it never drives a login-state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionRecoveryState {
    #[default]
    Disconnected,
    Connected,
    Recovering,
    FailedToRecover,
    Recovered,
}

impl ConnectionRecoveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionRecoveryState::Disconnected => "disconnected",
            ConnectionRecoveryState::Connected => "connected",
            ConnectionRecoveryState::Recovering => "recovering",
            ConnectionRecoveryState::FailedToRecover => "failed_to_recover",
            ConnectionRecoveryState::Recovered => "recovered",
        }
    }
}

impl fmt::Display for ConnectionRecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one connection axis (audio, text, or the channel overall).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which channel(s) receive locally captured audio.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionMode {
    /// Transmit to no channel.
    #[default]
    None,
    /// Transmit to exactly one channel.
    Single(ChannelId),
    /// Transmit to every connected channel.
    All,
}

impl TransmissionMode {
    /// Whether audio captured locally should reach `channel`.
    pub fn targets(&self, channel: &ChannelId) -> bool {
        match self {
            TransmissionMode::None => false,
            TransmissionMode::Single(target) => target == channel,
            TransmissionMode::All => true,
        }
    }
}

impl fmt::Display for TransmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransmissionMode::None => f.write_str("none"),
            TransmissionMode::Single(channel) => write!(f, "single({})", channel.name()),
            TransmissionMode::All => f.write_str("all"),
        }
    }
}
