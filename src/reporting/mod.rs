//! Fan-out to reporter sinks: the line reporter and the two streaming
//! transports (raw TCP, WebSocket) all implement the same small contract.

pub mod line;
pub mod streaming;

use crate::error::Result;
use crate::track::DeviceReport;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

/// Shared contract every reporter sink implements. `report` runs inline on
/// the registry task, so implementations must be cheap and non-blocking —
/// streaming reporters enqueue onto session channels with `try_send` rather
/// than awaiting anything here.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Short identifying name, used in log lines when this reporter fails.
    fn name(&self) -> &'static str;

    /// Handle one freshly emitted report. A reporter that wants to ignore
    /// reports with no changes is expected to check `DeviceReport::has_any_changes`
    /// itself, since that gate differs by transport (see module docs).
    fn report(&self, report: &DeviceReport) -> Result<()>;

    /// Called once at startup after every reporter has been registered, to
    /// spawn whatever background tasks (acceptors, session pumps) a
    /// streaming reporter needs. Line reporters have nothing to start.
    fn start(&self) {}

    /// Requests a graceful stop: close acceptors, drain and close sessions.
    fn stop(&self) {}

    /// Waits for whatever `stop` set in motion to finish draining. Line
    /// reporters have nothing to wait for.
    async fn join(&self) {}
}

/// Holds the configured reporters and fans every report out to all of them,
/// isolating failures so one broken sink never takes down the others.
pub struct ReportingManager {
    reporters: Vec<Arc<dyn Reporter>>,
}

impl ReportingManager {
    pub fn new(reporters: Vec<Arc<dyn Reporter>>) -> Self {
        ReportingManager { reporters }
    }

    pub fn start(&self) {
        for reporter in &self.reporters {
            reporter.start();
        }
    }

    pub async fn stop(&self) {
        for reporter in &self.reporters {
            reporter.stop();
        }
        for reporter in &self.reporters {
            reporter.join().await;
        }
    }

    pub fn report(&self, report: &DeviceReport) {
        for reporter in &self.reporters {
            if let Err(err) = reporter.report(report) {
                error!(reporter = reporter.name(), error = %err, "reporter failed, skipping for this report");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::DeviceGuard;
    use crate::identifier::DataIdentifier;
    use crate::registry::DeviceRegistry;
    use crate::time::SystemClock;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Counting {
        count: Mutex<u32>,
    }

    impl Reporter for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn report(&self, report: &DeviceReport) -> Result<()> {
            if report.has_any_changes() {
                *self.count.lock() += 1;
            }
            Ok(())
        }
    }

    #[test]
    fn manager_fans_out_to_every_reporter() {
        let counter = Arc::new(Counting { count: Mutex::new(0) });
        let manager = ReportingManager::new(vec![counter.clone()]);
        let mut registry = DeviceRegistry::new(Arc::new(SystemClock));
        let id = DataIdentifier::new("b", "room/temp");
        let guard = Arc::new(crate::guard::UpdateGuard::new(
            "g",
            id.clone(),
            vec![Arc::new(crate::alarms::RangeAlarm::at_interval(-10.0, 10.0))],
        ));
        registry.add_guarded_device("d", Arc::new(DeviceGuard::new(None, vec![guard])));
        for report in registry.on_message(&id, b"100") {
            manager.report(&report);
        }
        assert_eq!(*counter.count.lock(), 1);
    }
}
