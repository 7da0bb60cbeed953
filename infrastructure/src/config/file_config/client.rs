//! Client deadlines from TOML (`[client]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use voxlink_application::ClientConfig;

/// Raw client configuration from TOML. All values are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileClientConfig {
    pub login_timeout_ms: u64,
    pub logout_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub disconnect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub history_page_timeout_ms: u64,
    /// Sleep between pump ticks when the engine had nothing queued
    pub pump_idle_ms: u64,
}

impl Default for FileClientConfig {
    fn default() -> Self {
        let defaults = ClientConfig::default();
        let ms = |d: Duration| d.as_millis() as u64;
        Self {
            login_timeout_ms: ms(defaults.login_timeout),
            logout_timeout_ms: ms(defaults.logout_timeout),
            connect_timeout_ms: ms(defaults.connect_timeout),
            disconnect_timeout_ms: ms(defaults.disconnect_timeout),
            request_timeout_ms: ms(defaults.request_timeout),
            history_page_timeout_ms: ms(defaults.history_page_timeout),
            pump_idle_ms: ms(defaults.pump_idle_interval),
        }
    }
}

impl FileClientConfig {
    /// Convert to the application's [`ClientConfig`].
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_login_timeout(Duration::from_millis(self.login_timeout_ms))
            .with_logout_timeout(Duration::from_millis(self.logout_timeout_ms))
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_disconnect_timeout(Duration::from_millis(self.disconnect_timeout_ms))
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
            .with_history_page_timeout(Duration::from_millis(self.history_page_timeout_ms))
            .with_pump_idle_interval(Duration::from_millis(self.pump_idle_ms))
    }

    /// Deadline fields that are zero, by TOML key.
    pub(super) fn zero_deadlines(&self) -> Vec<&'static str> {
        [
            ("client.login_timeout_ms", self.login_timeout_ms),
            ("client.logout_timeout_ms", self.logout_timeout_ms),
            ("client.connect_timeout_ms", self.connect_timeout_ms),
            ("client.disconnect_timeout_ms", self.disconnect_timeout_ms),
            ("client.request_timeout_ms", self.request_timeout_ms),
            ("client.history_page_timeout_ms", self.history_page_timeout_ms),
        ]
        .into_iter()
        .filter(|(_, value)| *value == 0)
        .map(|(key, _)| key)
        .collect()
    }
}
