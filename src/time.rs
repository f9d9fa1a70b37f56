//! Single monotonic time source, injectable so alarm timing logic can be
//! driven deterministically in tests instead of racing the wall clock.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Anything that can report "now" as a monotonic instant.
///
/// `FloodingAlarm` and `TimeoutAlarm` are the only alarms that consult this;
/// everything else is pure message-in/result-out.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock: delegates straight to `Instant::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only advances when told to. Shared (`Clone`s point at the
/// same underlying instant) so a test can hold one handle and hand `Arc<dyn
/// Clock>` clones to whatever alarms/registry it builds.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<Instant>>,
}

impl TestClock {
    pub fn new() -> Self {
        TestClock {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock();
        *guard += by;
    }
}

impl Default for TestClock {
    fn default() -> Self {
        TestClock::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}
