//! Mutable per-alarm tracking state and the immutable reports built from it.
//!
//! `DeviceRegistry` is the only writer of `AlarmTrack`/`PresenceTrack`; a
//! `DeviceReport` is always a deep copy, so once handed to a reporter it is
//! immune to whatever the registry does next.

use crate::alarms::AlarmOutcome;
use crate::guard::DevicePresence;
use crate::identifier::DataIdentifier;
use std::sync::Arc;

/// The (active, changed, updated, message) tuple the registry keeps for one
/// alarm. `changed`/`updated` are transient: cleared to false once a
/// `DeviceReport` carrying them has been emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmTrack {
    pub active: bool,
    pub changed: bool,
    pub updated: bool,
    pub message: Option<String>,
}

impl AlarmTrack {
    pub fn clear() -> Self {
        AlarmTrack {
            active: false,
            changed: false,
            updated: false,
            message: None,
        }
    }

    /// A device's presence track starts active ("not yet received") rather
    /// than clear, so a device that never publishes looks offline instead of
    /// silently healthy.
    pub fn presence_initial() -> Self {
        AlarmTrack {
            active: true,
            changed: false,
            updated: false,
            message: Some("presence not yet received".to_string()),
        }
    }

    /// Applies a freshly evaluated outcome, computing `changed` against the
    /// previous `active` value. Always marks `updated`.
    pub fn apply(&mut self, outcome: AlarmOutcome) {
        self.changed = outcome.active != self.active;
        self.updated = true;
        self.active = outcome.active;
        self.message = outcome.message;
    }

    pub fn clear_flags(&mut self) {
        self.changed = false;
        self.updated = false;
    }
}

/// One update-guard's tracking row: its identifier (fixed at registration)
/// and the per-alarm-name tracking tuples, in declaration order.
#[derive(Debug, Clone)]
pub struct GuardTrack {
    pub identifier: DataIdentifier,
    alarms: Vec<(&'static str, AlarmTrack)>,
}

impl GuardTrack {
    pub fn new(identifier: DataIdentifier, alarm_names: impl IntoIterator<Item = &'static str>) -> Self {
        GuardTrack {
            identifier,
            alarms: alarm_names.into_iter().map(|name| (name, AlarmTrack::clear())).collect(),
        }
    }

    pub fn get_mut(&mut self, alarm_name: &'static str) -> Option<&mut AlarmTrack> {
        self.alarms.iter_mut().find(|(name, _)| *name == alarm_name).map(|(_, track)| track)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &AlarmTrack)> {
        self.alarms.iter().map(|(name, track)| (*name, track))
    }

    fn clear_flags(&mut self) {
        for (_, track) in &mut self.alarms {
            track.clear_flags();
        }
    }

    fn has_changes(&self) -> bool {
        self.alarms.iter().any(|(_, track)| track.changed)
    }

    fn has_updates(&self) -> bool {
        self.alarms.iter().any(|(_, track)| track.updated)
    }
}

/// All tracking state for one registered device: its guards, keyed by guard
/// name in declaration order, and its optional presence declaration/track.
#[derive(Debug, Clone)]
pub struct DeviceTracks {
    guards: Vec<(Arc<str>, GuardTrack)>,
    presence: Option<(DevicePresence, AlarmTrack)>,
}

impl DeviceTracks {
    pub fn new(guards: Vec<(Arc<str>, GuardTrack)>, presence: Option<DevicePresence>) -> Self {
        let presence = presence.map(|declared| (declared, AlarmTrack::presence_initial()));
        DeviceTracks { guards, presence }
    }

    pub fn guard_mut(&mut self, guard_name: &str) -> Option<&mut GuardTrack> {
        self.guards.iter_mut().find(|(name, _)| name.as_ref() == guard_name).map(|(_, track)| track)
    }

    pub fn presence_mut(&mut self) -> Option<&mut AlarmTrack> {
        self.presence.as_mut().map(|(_, track)| track)
    }

    pub fn clear_flags(&mut self) {
        for (_, track) in &mut self.guards {
            track.clear_flags();
        }
        if let Some((_, track)) = &mut self.presence {
            track.clear_flags();
        }
    }

    /// Builds the deep-copied, immutable snapshot handed to reporters.
    pub fn snapshot(&self, device: impl Into<Arc<str>>) -> DeviceReport {
        DeviceReport {
            device: device.into(),
            presence: self.presence.clone(),
            guards: self.guards.clone(),
        }
    }
}

/// One reference into a `DeviceReport`'s alarm table, as surfaced by its
/// iterators.
#[derive(Debug, Clone)]
pub struct ReportAlarm<'a> {
    pub guard_name: &'a Arc<str>,
    pub identifier: &'a DataIdentifier,
    pub alarm_name: &'static str,
    pub track: &'a AlarmTrack,
}

/// Immutable, deep-copied per-device snapshot emitted after each event.
#[derive(Debug, Clone)]
pub struct DeviceReport {
    pub device: Arc<str>,
    presence: Option<(DevicePresence, AlarmTrack)>,
    guards: Vec<(Arc<str>, GuardTrack)>,
}

impl DeviceReport {
    pub fn presence(&self) -> Option<(&DevicePresence, &AlarmTrack)> {
        self.presence.as_ref().map(|(declared, track)| (declared, track))
    }

    pub fn has_presence_change(&self) -> bool {
        self.presence.as_ref().is_some_and(|(_, track)| track.changed)
    }

    pub fn has_presence_update(&self) -> bool {
        self.presence.as_ref().is_some_and(|(_, track)| track.updated)
    }

    pub fn has_presence_failure(&self) -> bool {
        self.presence.as_ref().is_some_and(|(_, track)| track.active)
    }

    pub fn alarms(&self) -> impl Iterator<Item = ReportAlarm<'_>> {
        self.guards.iter().flat_map(|(guard_name, guard_track)| {
            guard_track.iter().map(move |(alarm_name, track)| ReportAlarm {
                guard_name,
                identifier: &guard_track.identifier,
                alarm_name,
                track,
            })
        })
    }

    pub fn changed_alarms(&self) -> impl Iterator<Item = ReportAlarm<'_>> {
        self.alarms().filter(|a| a.track.changed)
    }

    pub fn updated_alarms(&self) -> impl Iterator<Item = ReportAlarm<'_>> {
        self.alarms().filter(|a| a.track.updated)
    }

    pub fn failing_alarms(&self) -> impl Iterator<Item = ReportAlarm<'_>> {
        self.alarms().filter(|a| a.track.active)
    }

    pub fn has_alarm_changes(&self) -> bool {
        self.guards.iter().any(|(_, track)| track.has_changes())
    }

    pub fn has_alarm_updates(&self) -> bool {
        self.guards.iter().any(|(_, track)| track.has_updates())
    }

    pub fn has_alarm_failures(&self) -> bool {
        self.guards.iter().any(|(_, track)| track.iter().any(|(_, t)| t.active))
    }

    /// Whether this report carries anything worth showing a reporter —
    /// the gate the line reporter and streaming reporters both apply.
    pub fn has_any_changes(&self) -> bool {
        self.has_presence_update() || self.has_alarm_changes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_initial_state_is_active_with_not_yet_received_message() {
        let track = AlarmTrack::presence_initial();
        assert!(track.active);
        assert!(!track.changed);
        assert!(!track.updated);
        assert_eq!(track.message.as_deref(), Some("presence not yet received"));
    }

    #[test]
    fn apply_marks_changed_only_when_active_flips() {
        let mut track = AlarmTrack::clear();
        track.apply(AlarmOutcome::clear());
        assert!(!track.changed);
        assert!(track.updated);

        track.apply(AlarmOutcome::fail("boom"));
        assert!(track.changed);
        assert!(track.active);

        track.clear_flags();
        track.apply(AlarmOutcome::fail("still boom"));
        assert!(!track.changed);
        assert!(track.updated);
    }

    #[test]
    fn guards_sharing_an_identifier_track_independently() {
        let id = DataIdentifier::new("b", "room/temp");
        let mut tracks = DeviceTracks::new(
            vec![
                ("wide".into(), GuardTrack::new(id.clone(), ["RangeAlarm"])),
                ("narrow".into(), GuardTrack::new(id.clone(), ["RangeAlarm"])),
            ],
            None,
        );
        tracks.guard_mut("wide").unwrap().get_mut("RangeAlarm").unwrap().apply(AlarmOutcome::clear());
        tracks.guard_mut("narrow").unwrap().get_mut("RangeAlarm").unwrap().apply(AlarmOutcome::fail("out of range"));

        let report = tracks.snapshot("device-1");
        let failing: Vec<_> = report.failing_alarms().collect();
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].guard_name.as_ref(), "narrow");
    }

    #[test]
    fn clearing_flags_after_emission_preserves_active_and_message() {
        let id = DataIdentifier::new("b", "room/temp");
        let mut tracks = DeviceTracks::new(vec![("g".into(), GuardTrack::new(id, ["RangeAlarm"]))], None);
        tracks.guard_mut("g").unwrap().get_mut("RangeAlarm").unwrap().apply(AlarmOutcome::fail("bad"));
        tracks.clear_flags();
        let report = tracks.snapshot("device-1");
        let alarm = report.alarms().next().unwrap();
        assert!(alarm.track.active);
        assert!(!alarm.track.changed);
        assert!(!alarm.track.updated);
        assert_eq!(alarm.track.message.as_deref(), Some("bad"));
    }
}
