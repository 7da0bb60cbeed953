//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod protocol_logger;
pub mod token_provider;
pub mod transport;
