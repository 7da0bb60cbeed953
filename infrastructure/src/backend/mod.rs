//! Transport adapters implementing the
//! [`Transport`](voxlink_application::ports::transport::Transport) port.

mod simulated;

pub use simulated::{BackendOptions, SimulatedBackend, status};
