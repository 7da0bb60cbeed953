//! Simulated backend configuration from TOML (`[backend]` section)

use crate::backend::BackendOptions;
use serde::{Deserialize, Serialize};

/// Raw backend configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    /// Domain every account and channel lives in
    pub domain: String,
    /// Issuer segment of account and channel URIs
    pub issuer: String,
    /// Delivery delay in pump polls
    pub latency_ticks: u64,
    /// Messages seeded into each channel's history
    pub history_seed: usize,
    /// Simulated peers present in every channel
    pub peers: Vec<String>,
    /// Key mixed into tokens minted by the static token provider
    pub token_key: String,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        let options = BackendOptions::default();
        Self {
            domain: "voice.example.com".to_string(),
            issuer: "demo".to_string(),
            latency_ticks: options.latency_ticks,
            history_seed: options.history_seed,
            peers: options.peers,
            token_key: "voxlink-dev".to_string(),
        }
    }
}

impl FileBackendConfig {
    pub fn to_options(&self) -> BackendOptions {
        BackendOptions::default()
            .with_latency_ticks(self.latency_ticks)
            .with_history_seed(self.history_seed)
            .with_peers(self.peers.clone())
    }
}
