//! Port for structured protocol logging.
//!
//! Defines the [`ProtocolLogger`] trait for recording every request handed
//! to the engine and every message drained from it.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port captures the full protocol
//! exchange in a machine-readable form (JSONL).

use serde_json::Value;

/// Direction of a protocol record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        }
    }
}

/// A single protocol exchange.
pub struct ProtocolRecord {
    pub direction: Direction,
    /// Request or message kind (e.g. "login", "event media_stream_updated").
    pub kind: String,
    /// Serialized message.
    pub payload: Value,
}

impl ProtocolRecord {
    pub fn new(direction: Direction, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            direction,
            kind: kind.into(),
            payload,
        }
    }
}

/// Port for logging protocol exchanges.
///
/// `log` is synchronous and non-fallible; it is called from the pump tick
/// and must not disturb it.
pub trait ProtocolLogger: Send + Sync {
    fn log(&self, record: ProtocolRecord);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoProtocolLogger;

impl ProtocolLogger for NoProtocolLogger {
    fn log(&self, _record: ProtocolRecord) {}
}
