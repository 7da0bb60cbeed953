//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Every table is optional; missing keys fall back to defaults.

mod backend;
mod client;
mod logging;

pub use backend::FileBackendConfig;
pub use client::FileClientConfig;
pub use logging::FileLoggingConfig;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use voxlink_domain::AccountId;

/// Problems found while validating a [`FileConfig`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("{key} cannot be 0")]
    ZeroDeadline { key: &'static str },

    #[error("backend.{field} is not a valid URI segment: {reason}")]
    InvalidIdentity { field: &'static str, reason: String },

    #[error("backend.peers contains '{0}' more than once")]
    DuplicatePeer(String),

    #[error("logging.protocol_log cannot be empty")]
    EmptyProtocolLogPath,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Caller-side deadlines
    pub client: FileClientConfig,
    /// Simulated backend settings
    pub backend: FileBackendConfig,
    /// Protocol log settings
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning every problem found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors: Vec<_> = self
            .client
            .zero_deadlines()
            .into_iter()
            .map(|key| ConfigValidationError::ZeroDeadline { key })
            .collect();

        // Issuer and domain are checked through the identities they build
        let probes = [
            ("issuer", AccountId::new(&self.backend.issuer, "probe", "example.com", None)),
            ("domain", AccountId::new("probe", "probe", &self.backend.domain, None)),
        ];
        for (field, probe) in probes {
            if let Err(e) = probe {
                errors.push(ConfigValidationError::InvalidIdentity {
                    field,
                    reason: e.to_string(),
                });
            }
        }

        let mut seen = HashSet::new();
        for peer in &self.backend.peers {
            if let Err(e) = AccountId::new("probe", peer, "example.com", None) {
                errors.push(ConfigValidationError::InvalidIdentity {
                    field: "peers",
                    reason: e.to_string(),
                });
            } else if !seen.insert(peer.as_str()) {
                errors.push(ConfigValidationError::DuplicatePeer(peer.clone()));
            }
        }

        if self
            .logging
            .protocol_log
            .as_deref()
            .is_some_and(|path| path.trim().is_empty())
        {
            errors.push(ConfigValidationError::EmptyProtocolLogPath);
        }

        errors
    }
}
