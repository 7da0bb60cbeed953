//! Development token minting.
//!
//! [`StaticTokenProvider`] stands in for a token server: it formats a token
//! from a shared key, the authorized action and its subjects, plus an
//! expiry. The simulated backend accepts any non-empty token, so this only
//! needs to be deterministic enough to read in protocol logs.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;
use voxlink_application::ClientError;
use voxlink_application::ports::token_provider::{TokenAction, TokenProvider, TokenRequest};

const DEFAULT_VALIDITY_SECS: i64 = 90;

/// Token provider backed by a static key.
pub struct StaticTokenProvider {
    key: String,
    validity: ChronoDuration,
    /// Actions this provider refuses to sign.
    denied: Mutex<HashSet<TokenAction>>,
}

impl StaticTokenProvider {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            validity: ChronoDuration::seconds(DEFAULT_VALIDITY_SECS),
            denied: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_validity(mut self, validity: ChronoDuration) -> Self {
        self.validity = validity;
        self
    }

    /// Refuse to sign tokens for `action` from now on.
    pub fn deny(&self, action: TokenAction) {
        self.denied
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(action);
    }

    /// Build the token for `request` as of `now`.
    pub fn mint(&self, request: &TokenRequest, now: DateTime<Utc>) -> String {
        let mut token = format!("{}:{}:{}", self.key, request.action, request.account.to_uri());
        if let Some(channel) = &request.channel {
            token.push(':');
            token.push_str(&channel.to_uri());
        }
        if let Some(target) = &request.target_uri {
            token.push(':');
            token.push_str(target);
        }
        token.push_str(&format!(":exp={}", (now + self.validity).timestamp()));
        token
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, request: &TokenRequest) -> Result<String, ClientError> {
        let denied = self
            .denied
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&request.action);
        if denied {
            return Err(ClientError::Token(format!(
                "signing '{}' tokens is not allowed",
                request.action
            )));
        }
        debug!("Tokens: minting {} token for {}", request.action, request.account);
        Ok(self.mint(request, Utc::now()))
    }
}
