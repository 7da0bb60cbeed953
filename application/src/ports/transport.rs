//! Native engine port
//!
//! Defines the boundary between the session layer and the native
//! conferencing engine. The engine is push based: requests are handed over
//! with [`Transport::issue`], and responses and events are drained later,
//! one at a time, with [`Transport::next_message`].

use thiserror::Error;
use voxlink_domain::{Message, RequestEnvelope};

/// Errors raised synchronously when handing a request to the engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Engine rejected request (status {code})")]
    Rejected { code: i32 },

    #[error("Transport closed")]
    Closed,
}

/// Boundary to the native engine.
///
/// Implementations live in the infrastructure layer (or in tests). Both
/// methods must be non-blocking: `next_message` returns `None` when nothing
/// is queued right now.
pub trait Transport: Send + Sync {
    /// Hand a request to the engine. The response, if any, arrives later
    /// through [`next_message`](Self::next_message) carrying the same token.
    fn issue(&self, request: RequestEnvelope) -> Result<(), TransportError>;

    /// Pop the next queued inbound message, if any.
    fn next_message(&self) -> Option<Message>;
}
