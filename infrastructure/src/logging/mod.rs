//! Logging infrastructure: structured protocol logging.
//!
//! Provides [`JsonlProtocolLogger`], a JSONL file writer that implements
//! the [`ProtocolLogger`](voxlink_application::ports::protocol_logger::ProtocolLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlProtocolLogger;
