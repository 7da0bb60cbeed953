//! Client parameters: caller-side deadlines and pump pacing.
//!
//! [`ClientConfig`] groups the static parameters that bound every
//! asynchronous operation in the session layer. Deadlines are enforced on
//! the caller's side; the backend never sees them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deadlines and pump pacing.
///
/// | Deadline | Used by |
/// |----------|---------|
/// | `login_timeout` | `LoginSession::login` |
/// | `logout_timeout` | `LoginSession::logout`, runtime shutdown |
/// | `connect_timeout` | `ChannelSession::connect` |
/// | `disconnect_timeout` | `ChannelSession::disconnect` |
/// | `request_timeout` | single request/response operations |
/// | `history_page_timeout` | each page of a history query |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub login_timeout: Duration,
    pub logout_timeout: Duration,
    pub connect_timeout: Duration,
    pub disconnect_timeout: Duration,
    pub request_timeout: Duration,
    pub history_page_timeout: Duration,
    /// Sleep between pump ticks when no message was processed.
    pub pump_idle_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            login_timeout: Duration::from_secs(30),
            logout_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(30),
            disconnect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            history_page_timeout: Duration::from_secs(15),
            pump_idle_interval: Duration::from_millis(20),
        }
    }
}

impl ClientConfig {
    // ==================== Builder Methods ====================

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_history_page_timeout(mut self, timeout: Duration) -> Self {
        self.history_page_timeout = timeout;
        self
    }

    pub fn with_pump_idle_interval(mut self, interval: Duration) -> Self {
        self.pump_idle_interval = interval;
        self
    }
}
