//! mqguard — a diagnostic supervisor for message-queue telemetry streams.
//!
//! Subscribes to one or more brokers, evaluates every published message
//! against user-declared per-topic alarms, tracks each alarm's armed/cleared
//! state over time, and streams a structured diagnostic feed to live
//! observers (a line log, a raw socket, or a WebSocket).

#![warn(missing_docs)]

pub mod alarms;
pub mod cli;
pub mod config;
pub mod error;
pub mod guard;
pub mod identifier;
pub mod mqtt;
pub mod periodic;
pub mod registry;
pub mod reporting;
pub mod supervisor;
pub mod time;
pub mod track;

pub use error::{MqguardError, Result};
pub use guard::{DeviceGuard, DevicePresence, UpdateGuard};
pub use identifier::{BrokerDescriptor, DataIdentifier};
pub use registry::DeviceRegistry;
pub use track::DeviceReport;

/// Crate version, as reported by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate authors, as declared in `Cargo.toml`.
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
