use super::{Alarm, AlarmKind, AlarmOutcome, AlarmPriority};
use crate::identifier::DataIdentifier;
use std::collections::HashSet;

/// Fires when the decoded payload matches one of a configured set of error
/// tokens (e.g. device-reported fault codes).
pub struct ErrorCodesAlarm {
    codes: HashSet<String>,
}

impl ErrorCodesAlarm {
    pub fn new(codes: impl IntoIterator<Item = String>) -> Self {
        ErrorCodesAlarm {
            codes: codes.into_iter().collect(),
        }
    }
}

impl Alarm for ErrorCodesAlarm {
    fn name(&self) -> &'static str {
        "ErrorCodesAlarm"
    }

    fn kind(&self) -> AlarmKind {
        AlarmKind::MessageDriven
    }

    fn priority(&self) -> AlarmPriority {
        AlarmPriority::ErrorCode
    }

    fn criteria(&self) -> Option<String> {
        let mut codes: Vec<&str> = self.codes.iter().map(String::as_str).collect();
        codes.sort_unstable();
        Some(codes.join(" "))
    }

    fn check_decoded(&self, _identifier: &DataIdentifier, text: &str) -> AlarmOutcome {
        if self.codes.contains(text) {
            AlarmOutcome::fail(format!("Error code detected: {}", text))
        } else {
            AlarmOutcome::clear()
        }
    }
}
