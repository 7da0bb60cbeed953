//! Application layer for voxlink
//!
//! This crate drives login and channel sessions over an abstract
//! [`Transport`]. It depends only on the domain layer.
//!
//! # Architecture
//!
//! ```text
//! ClientRuntime
//!   ├── MessagePump ──▶ Transport (port)
//!   │     └── CorrelationTable (token → Completion<Response>)
//!   └── LoginSession (per account)
//!         └── ChannelSession (per channel)
//! ```
//!
//! Every asynchronous operation returns a [`Completion`] that resolves
//! exactly once; the `async` wrappers add caller-side deadlines from
//! [`ClientConfig`].

pub mod channel;
pub mod completion;
pub mod config;
pub mod correlation;
pub mod error;
pub mod history;
pub mod login;
pub mod observable;
pub mod ports;
pub mod pump;
pub mod runtime;
pub(crate) mod services;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use channel::{ChannelSession, ChannelUpdate, ConnectOptions, SpatialPosition};
pub use completion::Completion;
pub use config::ClientConfig;
pub use correlation::CorrelationTable;
pub use error::{ClientError, Result};
pub use history::{HISTORY_PAGE_SIZE, HistoryAggregator, HistoryQuery};
pub use login::{LoginOptions, LoginSession};
pub use observable::StateCell;
pub use ports::{
    protocol_logger::{Direction, NoProtocolLogger, ProtocolLogger, ProtocolRecord},
    token_provider::{NoTokenProvider, TokenAction, TokenProvider, TokenRequest},
    transport::{Transport, TransportError},
};
pub use pump::{EventSubscriber, MessagePump, SubscriptionId};
pub use runtime::{ClientRuntime, ClientRuntimeBuilder};
