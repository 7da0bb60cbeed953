//! Access token port
//!
//! Login, join, moderator mute and transcription requests each need a
//! signed access token. Signing happens outside this crate; the sessions ask
//! a [`TokenProvider`] when the caller did not supply a token and wait for
//! it before issuing the request.

use crate::error::ClientError;
use async_trait::async_trait;
use std::fmt;
use voxlink_domain::{AccountId, ChannelId};

/// Operation an access token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenAction {
    Login,
    Join,
    Mute,
    Transcribe,
}

impl fmt::Display for TokenAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenAction::Login => "login",
            TokenAction::Join => "join",
            TokenAction::Mute => "mute",
            TokenAction::Transcribe => "transcribe",
        };
        f.write_str(s)
    }
}

/// What a token is requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub action: TokenAction,
    /// The account performing the action.
    pub account: AccountId,
    pub channel: Option<ChannelId>,
    /// Target account URI for moderator actions.
    pub target_uri: Option<String>,
}

impl TokenRequest {
    pub fn login(account: &AccountId) -> Self {
        Self {
            action: TokenAction::Login,
            account: account.clone(),
            channel: None,
            target_uri: None,
        }
    }

    pub fn join(account: &AccountId, channel: &ChannelId) -> Self {
        Self {
            action: TokenAction::Join,
            account: account.clone(),
            channel: Some(channel.clone()),
            target_uri: None,
        }
    }

    pub fn mute(account: &AccountId, channel: &ChannelId, target_uri: impl Into<String>) -> Self {
        Self {
            action: TokenAction::Mute,
            account: account.clone(),
            channel: Some(channel.clone()),
            target_uri: Some(target_uri.into()),
        }
    }

    pub fn transcribe(account: &AccountId, channel: &ChannelId) -> Self {
        Self {
            action: TokenAction::Transcribe,
            account: account.clone(),
            channel: Some(channel.clone()),
            target_uri: None,
        }
    }
}

/// Supplier of signed access tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, request: &TokenRequest) -> Result<String, ClientError>;
}

/// Provider used when every call site supplies its own token.
pub struct NoTokenProvider;

#[async_trait]
impl TokenProvider for NoTokenProvider {
    async fn token(&self, request: &TokenRequest) -> Result<String, ClientError> {
        Err(ClientError::Token(format!(
            "no token provider configured for '{}'",
            request.action
        )))
    }
}
