//! Adapters binding the service ports to external systems.

pub mod relay;

pub use relay::{RelayClient, RelaySigner};
