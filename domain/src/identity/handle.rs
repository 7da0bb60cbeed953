//! Session handles: the opaque keys the native engine uses to address
//! login and channel sessions.
//!
//! Every inbound event carries one of these handles, and every session
//! filters events by handle equality before acting on them.

use super::{AccountId, ChannelId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a login session. Formed from the account URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountHandle(String);

impl AccountHandle {
    pub fn for_account(account: &AccountId) -> Self {
        Self(account.to_uri())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of a channel session: the account handle followed by the
/// channel URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn for_channel(account: &AccountHandle, channel: &ChannelId) -> Self {
        Self(format!("{}{}", account.as_str(), channel.to_uri()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this session belongs to the given login session.
    pub fn belongs_to(&self, account: &AccountHandle) -> bool {
        self.0.starts_with(account.as_str())
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of a participant within one channel session, assigned by the
/// backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantHandle(String);

impl ParticipantHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<T: Into<String>> From<T> for ParticipantHandle {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}
