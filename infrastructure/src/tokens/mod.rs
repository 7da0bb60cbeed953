//! Access token adapters implementing the
//! [`TokenProvider`](voxlink_application::ports::token_provider::TokenProvider) port.

mod static_provider;

pub use static_provider::StaticTokenProvider;
