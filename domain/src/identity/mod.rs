//! Identities of accounts, channels and sessions.
//!
//! - [`AccountId`]: account identity with a `sip:.issuer.name.@domain` URI form
//! - [`ChannelId`]: channel identity including kind and 3D properties
//! - [`AccountHandle`] / [`SessionHandle`]: opaque keys used by the native engine
//! - [`uri::strip_resource_suffix`]: clean-up for backend-originated URIs

pub mod account;
pub mod channel;
pub mod handle;
pub mod uri;

pub use account::AccountId;
pub use channel::{AudioFadeModel, ChannelId, ChannelType, PositionalProperties};
pub use handle::{AccountHandle, ParticipantHandle, SessionHandle};
