//! Correlation tokens ("cookies") linking a request to its response.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-assigned identifier echoed back by the backend in the response.
///
/// Tokens are generated monotonically by the correlation table and are
/// unique among outstanding requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(u64);

impl CorrelationToken {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
