use super::{Alarm, AlarmKind, AlarmOutcome, AlarmPriority};
use crate::identifier::DataIdentifier;

/// The synthetic alarm bound to a device's presence topic. Lives inside the
/// device's presence update-guard rather than an ordinary `UpdateGuard`'s
/// alarm list; see `crate::guard::DeviceGuard`.
pub struct PresenceAlarm {
    online: String,
    offline: String,
}

impl PresenceAlarm {
    pub fn new(online: impl Into<String>, offline: impl Into<String>) -> Self {
        PresenceAlarm {
            online: online.into(),
            offline: offline.into(),
        }
    }
}

impl Alarm for PresenceAlarm {
    fn name(&self) -> &'static str {
        "Presence"
    }

    fn kind(&self) -> AlarmKind {
        AlarmKind::MessageDriven
    }

    fn priority(&self) -> AlarmPriority {
        AlarmPriority::Value
    }

    fn criteria(&self) -> Option<String> {
        Some(format!("online='{}' offline='{}'", self.online, self.offline))
    }

    fn check_decoded(&self, _identifier: &DataIdentifier, text: &str) -> AlarmOutcome {
        if text == self.online {
            AlarmOutcome::clear()
        } else if text == self.offline {
            AlarmOutcome::fail("Device is offline")
        } else {
            AlarmOutcome::fail(format!("Unexpected presence value: {}", text))
        }
    }
}
