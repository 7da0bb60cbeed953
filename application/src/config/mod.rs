//! Application-level configuration.
//!
//! - [`ClientConfig`]: caller-side deadlines and pump pacing

pub mod client_config;

pub use client_config::ClientConfig;
