//! The seven alarm variants and the capability set they share.
//!
//! "Active" means firing. `check_message`/`check_periodic` return the
//! current verdict; `notify_message` is the side-effecting half used only by
//! periodic alarms to record that a message arrived (see `TimeoutAlarm`).

mod data_type;
mod error_codes;
mod flooding;
mod presence;
mod range;
mod timeout;

pub use data_type::{DataTypeAlarm, DataTypeKind};
pub use error_codes::ErrorCodesAlarm;
pub use flooding::FloodingAlarm;
pub use presence::PresenceAlarm;
pub use range::RangeAlarm;
pub use timeout::TimeoutAlarm;

use crate::identifier::DataIdentifier;
use crate::time::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    MessageDriven,
    Periodic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlarmPriority {
    ErrorCode,
    DataType,
    Value,
    Other,
}

/// Result of evaluating an alarm once: whether it is currently firing, and
/// an optional human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmOutcome {
    pub active: bool,
    pub message: Option<String>,
}

impl AlarmOutcome {
    pub fn clear() -> Self {
        AlarmOutcome {
            active: false,
            message: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        AlarmOutcome {
            active: true,
            message: Some(message.into()),
        }
    }
}

/// Shared capability set implemented by every concrete alarm.
pub trait Alarm: Send + Sync {
    /// Alarm names are a closed set of literal strings — used both for
    /// display (line/streaming reporters) and as the tracking-table key, so
    /// they live for `'static` rather than being borrowed from `self`.
    fn name(&self) -> &'static str;

    fn kind(&self) -> AlarmKind;

    fn priority(&self) -> AlarmPriority;

    /// Free-form description of the configured criteria, used by streaming
    /// snapshots so a client can render "what is being checked" without
    /// re-deriving it from the raw config file.
    fn criteria(&self) -> Option<String> {
        None
    }

    /// Evaluate an incoming message. The default implementation decodes the
    /// payload as UTF-8 and defers to `check_decoded`; alarms that work
    /// directly on bytes, or need the clock (`FloodingAlarm`), override this
    /// instead.
    fn check_message(&self, identifier: &DataIdentifier, payload: &[u8], clock: &dyn Clock) -> AlarmOutcome {
        let _ = clock;
        match std::str::from_utf8(payload) {
            Ok(text) => self.check_decoded(identifier, text),
            Err(_) => AlarmOutcome::fail("Data decoding error"),
        }
    }

    fn check_decoded(&self, identifier: &DataIdentifier, text: &str) -> AlarmOutcome {
        let _ = (identifier, text);
        AlarmOutcome::clear()
    }

    /// Record that a message arrived, independent of `check_message`. Only
    /// `TimeoutAlarm` uses this; the return value means "this alarm should
    /// be considered deactivated as a result of this notification".
    fn notify_message(&self, identifier: &DataIdentifier, payload: &[u8], clock: &dyn Clock) -> bool {
        let _ = (identifier, payload, clock);
        false
    }

    /// Evaluate a wall-clock-driven periodic tick. Only periodic alarms
    /// (`TimeoutAlarm`) implement this meaningfully.
    fn check_periodic(&self, clock: &dyn Clock) -> AlarmOutcome {
        let _ = clock;
        AlarmOutcome::clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decodes;
    impl Alarm for Decodes {
        fn name(&self) -> &'static str {
            "Decodes"
        }
        fn kind(&self) -> AlarmKind {
            AlarmKind::MessageDriven
        }
        fn priority(&self) -> AlarmPriority {
            AlarmPriority::Other
        }
        fn check_decoded(&self, _identifier: &DataIdentifier, text: &str) -> AlarmOutcome {
            if text == "ok" {
                AlarmOutcome::clear()
            } else {
                AlarmOutcome::fail("not ok")
            }
        }
    }

    #[test]
    fn invalid_utf8_is_a_decoding_error() {
        let alarm = Decodes;
        let id = DataIdentifier::new("b", "t");
        let clock = crate::time::SystemClock;
        let outcome = alarm.check_message(&id, &[0xff, 0xfe], &clock);
        assert!(outcome.active);
        assert_eq!(outcome.message.as_deref(), Some("Data decoding error"));
    }

    #[test]
    fn valid_utf8_is_decoded() {
        let alarm = Decodes;
        let id = DataIdentifier::new("b", "t");
        let clock = crate::time::SystemClock;
        assert!(!alarm.check_message(&id, b"ok", &clock).active);
        assert!(alarm.check_message(&id, b"bad", &clock).active);
    }
}
