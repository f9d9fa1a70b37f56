use super::{Alarm, AlarmKind, AlarmOutcome, AlarmPriority};
use crate::identifier::DataIdentifier;
use crate::time::Clock;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Periodic alarm: fires when no message has been observed on its
/// identifier for longer than `period`. `notify_message` (called by
/// `UpdateGuard::get_update_check` whenever a message arrives on the
/// identifier) always clears it and refreshes the timestamp.
pub struct TimeoutAlarm {
    period: Duration,
    last_message: Mutex<Option<Instant>>,
}

impl TimeoutAlarm {
    pub fn new(period: Duration) -> Self {
        TimeoutAlarm {
            period,
            last_message: Mutex::new(None),
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        TimeoutAlarm::new(Duration::from_secs(seconds))
    }
}

impl Alarm for TimeoutAlarm {
    fn name(&self) -> &'static str {
        "TimeoutAlarm"
    }

    fn kind(&self) -> AlarmKind {
        AlarmKind::Periodic
    }

    fn priority(&self) -> AlarmPriority {
        AlarmPriority::Other
    }

    fn criteria(&self) -> Option<String> {
        Some(format!("max silence {:?}", self.period))
    }

    fn notify_message(&self, _identifier: &DataIdentifier, _payload: &[u8], clock: &dyn Clock) -> bool {
        *self.last_message.lock() = Some(clock.now());
        true
    }

    fn check_periodic(&self, clock: &dyn Clock) -> AlarmOutcome {
        let now = clock.now();
        let mut last = self.last_message.lock();
        match *last {
            Some(previous) => {
                let elapsed = now.saturating_duration_since(previous);
                if elapsed > self.period {
                    AlarmOutcome::fail(format!("Update timeouted: {}s", elapsed.as_secs_f64()))
                } else {
                    AlarmOutcome::clear()
                }
            }
            None => {
                // No message has ever been seen. Seed the timestamp so the
                // alarm can fire on a later tick instead of firing
                // immediately on process startup.
                *last = Some(now);
                AlarmOutcome::clear()
            }
        }
    }
}
