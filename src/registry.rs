//! `DeviceRegistry`: the central state store and the only writer of alarm
//! tracking state. This module is deliberately synchronous — the async
//! single-consumer mailbox that serialises calls onto it lives in
//! `crate::supervisor`, so the routing and bookkeeping logic here can be
//! exercised directly in tests without any broker or runtime.

use crate::guard::DeviceGuard;
use crate::identifier::DataIdentifier;
use crate::time::Clock;
use crate::track::{DeviceReport, DeviceTracks, GuardTrack};
use std::collections::HashMap;
use std::sync::Arc;

struct RegisteredDevice {
    guard: Arc<DeviceGuard>,
    tracks: DeviceTracks,
}

/// Owns every registered device's guard tree and tracking state, and routes
/// ingress events to the guards relevant to them.
pub struct DeviceRegistry {
    clock: Arc<dyn Clock>,
    devices: HashMap<Arc<str>, RegisteredDevice>,
}

impl DeviceRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        DeviceRegistry {
            clock,
            devices: HashMap::new(),
        }
    }

    /// Registers a device's guard tree, materialising its tracking tables.
    /// Overwrites any existing registration for the same device name.
    pub fn add_guarded_device(&mut self, device: impl Into<Arc<str>>, guard: Arc<DeviceGuard>) {
        let device = device.into();
        let guard_tracks = guard
            .update_guards()
            .iter()
            .map(|update_guard| {
                let names = update_guard.alarms().map(|alarm| alarm.name());
                (update_guard.name.clone(), GuardTrack::new(update_guard.identifier.clone(), names))
            })
            .collect();
        let tracks = DeviceTracks::new(guard_tracks, guard.presence_declaration().cloned());
        self.devices.insert(
            device,
            RegisteredDevice {
                guard,
                tracks,
            },
        );
    }

    pub fn device_names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.devices.keys()
    }

    /// A snapshot of every registered device's current tracking state, used
    /// to build a streaming session's initial frame.
    pub fn snapshot_all(&self) -> Vec<DeviceReport> {
        self.devices
            .iter()
            .map(|(device, registered)| registered.tracks.snapshot(device.clone()))
            .collect()
    }

    /// Every registered device's guard tree, alongside its name. Used by
    /// streaming reporters to describe configured criteria in an init frame
    /// without re-deriving it from the raw configuration file.
    pub fn guard_handles(&self) -> Vec<(Arc<str>, Arc<DeviceGuard>)> {
        self.devices
            .iter()
            .map(|(device, registered)| (device.clone(), registered.guard.clone()))
            .collect()
    }

    /// Routes one ingress message to every device whose guard tree is
    /// relevant to `identifier`, applying the resulting alarm outcomes and
    /// producing one report per affected device. A message always produces a
    /// report for an affected device (unlike periodic ticks, which are
    /// gated) since an ingress event is itself a meaningful occurrence.
    pub fn on_message(&mut self, identifier: &DataIdentifier, payload: &[u8]) -> Vec<DeviceReport> {
        let clock = Arc::clone(&self.clock);
        let mut reports = Vec::new();
        for (device, registered) in self.devices.iter_mut() {
            let (presence_outcome, events) = registered.guard.message_received(identifier, payload, clock.as_ref());
            if presence_outcome.is_none() && events.is_empty() {
                continue;
            }
            if let Some(outcome) = presence_outcome {
                if let Some(track) = registered.tracks.presence_mut() {
                    track.apply(outcome);
                }
            }
            for event in events {
                let guard_track = registered
                    .tracks
                    .guard_mut(&event.guard_name)
                    .unwrap_or_else(|| panic!("guard '{}' not registered for device '{}'", event.guard_name, device));
                let track = guard_track
                    .get_mut(event.alarm_name)
                    .unwrap_or_else(|| panic!("alarm '{}' not tracked for guard '{}'", event.alarm_name, event.guard_name));
                track.apply(event.outcome);
            }
            let report = registered.tracks.snapshot(device.clone());
            registered.tracks.clear_flags();
            reports.push(report);
        }
        reports
    }

    /// Runs every device's periodic alarms against the current clock. Unlike
    /// `on_message`, a device only yields a report when its tick actually
    /// changed or touched a tracking tuple — otherwise every device would
    /// emit a no-op report on every tick.
    pub fn on_periodic(&mut self) -> Vec<DeviceReport> {
        let clock = Arc::clone(&self.clock);
        let mut reports = Vec::new();
        for (device, registered) in self.devices.iter_mut() {
            let events = registered.guard.on_periodic(clock.as_ref());
            if events.is_empty() {
                continue;
            }
            for event in events {
                let guard_track = registered
                    .tracks
                    .guard_mut(&event.guard_name)
                    .unwrap_or_else(|| panic!("guard '{}' not registered for device '{}'", event.guard_name, device));
                let track = guard_track
                    .get_mut(event.alarm_name)
                    .unwrap_or_else(|| panic!("alarm '{}' not tracked for guard '{}'", event.alarm_name, event.guard_name));
                track.apply(event.outcome);
            }
            let report = registered.tracks.snapshot(device.clone());
            let had_changes = report.has_alarm_changes() || report.has_alarm_updates();
            registered.tracks.clear_flags();
            if had_changes {
                reports.push(report);
            }
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::{RangeAlarm, TimeoutAlarm};
    use crate::guard::{DevicePresence, UpdateGuard};
    use crate::time::TestClock;
    use std::time::Duration;

    fn registry_with_range_device(clock: Arc<TestClock>) -> (DeviceRegistry, DataIdentifier) {
        let mut registry = DeviceRegistry::new(clock);
        let id = DataIdentifier::new("b", "room/temp");
        let guard = Arc::new(UpdateGuard::new(
            "tempCheck",
            id.clone(),
            vec![Arc::new(RangeAlarm::at_interval(-10.0, 40.0))],
        ));
        let device_guard = Arc::new(DeviceGuard::new(None, vec![guard]));
        registry.add_guarded_device("kitchen", device_guard);
        (registry, id)
    }

    #[test]
    fn in_range_message_yields_no_changed_flags_after_first_report() {
        let clock = Arc::new(TestClock::new());
        let (mut registry, id) = registry_with_range_device(clock);
        let reports = registry.on_message(&id, b"20");
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].has_alarm_changes() || reports[0].failing_alarms().count() == 0);
    }

    #[test]
    fn out_of_range_then_back_in_range_reports_change_twice() {
        let clock = Arc::new(TestClock::new());
        let (mut registry, id) = registry_with_range_device(clock);

        let first = registry.on_message(&id, b"20");
        assert!(!first[0].has_alarm_changes());

        let second = registry.on_message(&id, b"100");
        assert!(second[0].has_alarm_changes());
        assert_eq!(second[0].failing_alarms().count(), 1);

        let third = registry.on_message(&id, b"100");
        assert!(!third[0].has_alarm_changes());

        let fourth = registry.on_message(&id, b"20");
        assert!(fourth[0].has_alarm_changes());
        assert_eq!(fourth[0].failing_alarms().count(), 0);
    }

    #[test]
    fn unrelated_identifier_produces_no_reports() {
        let clock = Arc::new(TestClock::new());
        let (mut registry, _id) = registry_with_range_device(clock);
        let other = DataIdentifier::new("b", "unrelated/topic");
        assert!(registry.on_message(&other, b"1").is_empty());
    }

    #[test]
    fn periodic_tick_with_nothing_to_report_is_silent() {
        let clock = Arc::new(TestClock::new());
        let mut registry = DeviceRegistry::new(Arc::clone(&clock) as Arc<dyn Clock>);
        let id = DataIdentifier::new("b", "room/temp");
        let guard = Arc::new(UpdateGuard::new("tempCheck", id, vec![Arc::new(RangeAlarm::at_interval(-10.0, 40.0))]));
        registry.add_guarded_device("kitchen", Arc::new(DeviceGuard::new(None, vec![guard])));
        assert!(registry.on_periodic().is_empty());
    }

    #[test]
    fn timeout_alarm_fires_on_periodic_tick_after_silence() {
        let clock = Arc::new(TestClock::new());
        let id = DataIdentifier::new("b", "room/temp");
        let guard = Arc::new(UpdateGuard::new("heartbeat", id.clone(), vec![Arc::new(TimeoutAlarm::from_seconds(2))]));
        let mut registry = DeviceRegistry::new(Arc::clone(&clock) as Arc<dyn Clock>);
        registry.add_guarded_device("sensor", Arc::new(DeviceGuard::new(None, vec![guard])));

        registry.on_message(&id, b"1");
        assert!(registry.on_periodic().is_empty());

        clock.advance(Duration::from_secs(3));
        let reports = registry.on_periodic();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].failing_alarms().count(), 1);
    }

    #[test]
    fn device_with_presence_starts_offline_until_first_message() {
        let clock = Arc::new(TestClock::new());
        let mut registry = DeviceRegistry::new(Arc::clone(&clock) as Arc<dyn Clock>);
        let presence_id = DataIdentifier::new("b", "sensor/presence");
        let presence = DevicePresence {
            identifier: presence_id.clone(),
            online: "online".to_string(),
            offline: "offline".to_string(),
        };
        registry.add_guarded_device("sensor", Arc::new(DeviceGuard::new(Some(presence), vec![])));

        let snapshot = registry.snapshot_all();
        let report = snapshot.iter().find(|r| r.device.as_ref() == "sensor").unwrap();
        assert!(report.has_presence_failure());

        let reports = registry.on_message(&presence_id, b"online");
        let report = reports.iter().find(|r| r.device.as_ref() == "sensor").unwrap();
        assert!(!report.has_presence_failure());
        assert!(report.has_presence_change());
    }
}
