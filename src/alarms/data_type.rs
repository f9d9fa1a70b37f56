use super::{Alarm, AlarmKind, AlarmOutcome, AlarmPriority};
use crate::identifier::DataIdentifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataTypeKind {
    Numeric,
    Alphanumeric,
    Alphabetic,
}

impl DataTypeKind {
    fn label(self) -> &'static str {
        match self {
            DataTypeKind::Numeric => "numeric",
            DataTypeKind::Alphanumeric => "alphanumeric",
            DataTypeKind::Alphabetic => "alphabetic",
        }
    }

    fn matches(self, text: &str) -> bool {
        match self {
            DataTypeKind::Numeric => text.trim().parse::<f64>().is_ok(),
            DataTypeKind::Alphanumeric => !text.is_empty() && text.chars().all(char::is_alphanumeric),
            DataTypeKind::Alphabetic => !text.is_empty() && text.chars().all(char::is_alphabetic),
        }
    }
}

/// Fires when a decoded payload fails to match its declared shape.
pub struct DataTypeAlarm {
    kind: DataTypeKind,
}

impl DataTypeAlarm {
    pub fn numeric() -> Self {
        DataTypeAlarm {
            kind: DataTypeKind::Numeric,
        }
    }

    pub fn alphanumeric() -> Self {
        DataTypeAlarm {
            kind: DataTypeKind::Alphanumeric,
        }
    }

    pub fn alphabetic() -> Self {
        DataTypeAlarm {
            kind: DataTypeKind::Alphabetic,
        }
    }
}

impl Alarm for DataTypeAlarm {
    fn name(&self) -> &'static str {
        "DataTypeAlarm"
    }

    fn kind(&self) -> AlarmKind {
        AlarmKind::MessageDriven
    }

    fn priority(&self) -> AlarmPriority {
        AlarmPriority::DataType
    }

    fn criteria(&self) -> Option<String> {
        Some(self.kind.label().to_string())
    }

    fn check_decoded(&self, _identifier: &DataIdentifier, text: &str) -> AlarmOutcome {
        if self.kind.matches(text) {
            AlarmOutcome::clear()
        } else {
            AlarmOutcome::fail(format!(
                "Value '{}' is not {}",
                text,
                self.kind.label()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(alarm: &DataTypeAlarm, payload: &str) -> AlarmOutcome {
        let id = DataIdentifier::new("b", "t");
        let clock = crate::time::SystemClock;
        alarm.check_message(&id, payload.as_bytes(), &clock)
    }

    #[test]
    fn numeric_accepts_floats_and_rejects_letters() {
        let alarm = DataTypeAlarm::numeric();
        assert!(!check(&alarm, "3.14").active);
        assert!(check(&alarm, "abc").active);
    }

    #[test]
    fn alphanumeric_rejects_punctuation() {
        let alarm = DataTypeAlarm::alphanumeric();
        assert!(!check(&alarm, "abc123").active);
        assert!(check(&alarm, "abc-123").active);
    }

    #[test]
    fn alphabetic_rejects_digits() {
        let alarm = DataTypeAlarm::alphabetic();
        assert!(!check(&alarm, "hello").active);
        assert!(check(&alarm, "hello1").active);
    }

    #[test]
    fn empty_string_never_matches() {
        assert!(check(&DataTypeAlarm::numeric(), "").active);
        assert!(check(&DataTypeAlarm::alphabetic(), "").active);
    }
}
