//! Domain layer for voxlink
//!
//! This crate contains identities, protocol messages and conference
//! entities. It has no dependencies on the runtime, transport or
//! presentation concerns.
//!
//! # Core Concepts
//!
//! ## Identities and handles
//!
//! - **AccountId / ChannelId**: immutable value objects with a URI form
//! - **AccountHandle / SessionHandle**: opaque keys the native engine uses to
//!   address login and channel sessions
//!
//! ## Protocol
//!
//! Requests carry a correlation token; responses echo it; events are pushed
//! asynchronously and addressed by handle. All three are closed enums.

pub mod conference;
pub mod core;
pub mod identity;
pub mod protocol;

// Re-export commonly used types
pub use conference::{
    ChannelTextMessage, ConnectionRecoveryState, ConnectionState, DirectMessage, LoginState,
    Participant, ParticipantUpdate, Presence, PresenceStatus, TranscribedMessage,
    TransmissionMode, sort_chronologically,
};
pub use core::error::DomainError;
pub use identity::{
    AccountHandle, AccountId, AudioFadeModel, ChannelId, ChannelType, ParticipantHandle,
    PositionalProperties, SessionHandle, uri::strip_resource_suffix,
};
pub use protocol::{
    CorrelationToken, Event, HistoryFilter, Message, Request, RequestEnvelope, Response,
    ResponseBody, TransmitTarget,
};
