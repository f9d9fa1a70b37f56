//! Wires the registry into the rest of the process: a single mailbox task
//! owns the `DeviceRegistry` with no external locking, and every other task
//! (one per broker, the periodic ticker, every streaming session) only ever
//! talks to it by sending a `RegistryEvent`. This is what guarantees the
//! per-device total ordering of reports the tracking invariants depend on.

use crate::guard::DeviceGuard;
use crate::identifier::DataIdentifier;
use crate::registry::DeviceRegistry;
use crate::reporting::ReportingManager;
use crate::track::DeviceReport;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// The current state of every registered device: its tracking snapshot and
/// its (immutable, `Arc`-shared) guard tree, for sinks that need to describe
/// configured criteria rather than just current activity.
pub struct RegistrySnapshot {
    pub reports: Vec<DeviceReport>,
    pub guards: Vec<(Arc<str>, Arc<DeviceGuard>)>,
}

/// Everything that can be sent into the registry mailbox.
pub enum RegistryEvent {
    /// A decoded (broker, topic, payload) ingress triple.
    Message { identifier: DataIdentifier, payload: Vec<u8> },
    /// A periodic wall-clock tick.
    Periodic,
    /// A streaming session requesting the current state for its init frame.
    Snapshot(oneshot::Sender<RegistrySnapshot>),
}

/// Runs the registry mailbox loop until `events` closes (every sender
/// dropped). Consumes the registry and the reporting manager by value since
/// nothing outside this task ever needs to touch either again.
pub async fn run_registry_task(
    mut registry: DeviceRegistry,
    mut events: mpsc::Receiver<RegistryEvent>,
    reporting: Arc<ReportingManager>,
) {
    while let Some(event) = events.recv().await {
        match event {
            RegistryEvent::Message { identifier, payload } => {
                let reports = registry.on_message(&identifier, &payload);
                for report in reports {
                    reporting.report(&report);
                }
            }
            RegistryEvent::Periodic => {
                let reports = registry.on_periodic();
                for report in reports {
                    reporting.report(&report);
                }
            }
            RegistryEvent::Snapshot(reply) => {
                let snapshot = RegistrySnapshot {
                    reports: registry.snapshot_all(),
                    guards: registry.guard_handles(),
                };
                let _ = reply.send(snapshot);
            }
        }
    }
    debug!("registry mailbox closed, supervisor task exiting");
}
