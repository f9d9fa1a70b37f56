use super::{Alarm, AlarmKind, AlarmOutcome, AlarmPriority};
use crate::identifier::DataIdentifier;
use crate::time::Clock;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Fires when two messages on the same identifier arrive closer together
/// than `period`. The first message on an identifier is never flooding; the
/// timestamp is updated on every message regardless of the verdict.
pub struct FloodingAlarm {
    period: Duration,
    last_message: Mutex<Option<Instant>>,
}

impl FloodingAlarm {
    pub fn new(period: Duration) -> Self {
        FloodingAlarm {
            period,
            last_message: Mutex::new(None),
        }
    }

    pub fn from_seconds(seconds: u64) -> Self {
        FloodingAlarm::new(Duration::from_secs(seconds))
    }
}

impl Alarm for FloodingAlarm {
    fn name(&self) -> &'static str {
        "FloodingAlarm"
    }

    fn kind(&self) -> AlarmKind {
        AlarmKind::MessageDriven
    }

    fn priority(&self) -> AlarmPriority {
        AlarmPriority::Other
    }

    fn criteria(&self) -> Option<String> {
        Some(format!("period >= {:?}", self.period))
    }

    fn check_message(&self, _identifier: &DataIdentifier, payload: &[u8], clock: &dyn Clock) -> AlarmOutcome {
        if std::str::from_utf8(payload).is_err() {
            return AlarmOutcome::fail("Data decoding error");
        }
        let now = clock.now();
        let mut last = self.last_message.lock();
        let outcome = match *last {
            Some(previous) if now.saturating_duration_since(previous) < self.period => {
                AlarmOutcome::fail(format!(
                    "Update interval {:?} is shorter than the allowed {:?}",
                    now.saturating_duration_since(previous),
                    self.period
                ))
            }
            _ => AlarmOutcome::clear(),
        };
        *last = Some(now);
        outcome
    }
}
