//! Configuration file loading for voxlink
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `VOXLINK_`-prefixed environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./voxlink.toml` or `./.voxlink.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/voxlink/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileBackendConfig, FileClientConfig, FileConfig, FileLoggingConfig,
};
pub use loader::ConfigLoader;
