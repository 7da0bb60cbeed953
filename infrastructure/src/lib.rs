//! Infrastructure layer for voxlink
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod backend;
pub mod config;
pub mod logging;
pub mod tokens;

// Re-export commonly used types
pub use backend::{BackendOptions, SimulatedBackend};
pub use config::{
    ConfigLoader, ConfigValidationError, FileBackendConfig, FileClientConfig, FileConfig,
    FileLoggingConfig,
};
pub use logging::JsonlProtocolLogger;
pub use tokens::StaticTokenProvider;
