//! Wall-clock ticker that drives periodic (timeout) re-evaluation.

use crate::supervisor::RegistryEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default tick period, matching the original tool's default.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Runs the periodic ticker until `shutdown` is cancelled. Each tick sends a
/// `RegistryEvent::Periodic` to the registry mailbox; stop is idempotent
/// since cancelling an already-cancelled token is a no-op.
pub async fn run_periodic_checker(period: Duration, events: mpsc::Sender<RegistryEvent>, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("periodic checker stopping");
                return;
            }
            _ = interval.tick() => {
                if events.send(RegistryEvent::Periodic).await.is_err() {
                    debug!("registry mailbox closed, stopping periodic checker");
                    return;
                }
            }
        }
    }
}
