//! End-to-end scenarios driven entirely through the public core API
//! (`DeviceRegistry`, `TestClock`, `config::load`) — no broker, no sockets.

use mqguard::alarms::{FloodingAlarm, RangeAlarm, TimeoutAlarm};
use mqguard::config;
use mqguard::guard::{DeviceGuard, DevicePresence, UpdateGuard};
use mqguard::identifier::DataIdentifier;
use mqguard::reporting::streaming::{build_init_frame, build_update_frame};
use mqguard::supervisor::RegistrySnapshot;
use mqguard::time::TestClock;
use mqguard::DeviceRegistry;
use std::sync::Arc;
use std::time::Duration;

fn clocked_registry(clock: &Arc<TestClock>) -> DeviceRegistry {
    DeviceRegistry::new(clock.clone() as Arc<dyn mqguard::time::Clock>)
}

#[test]
fn s1_range_clear_fail_clear() {
    let clock = Arc::new(TestClock::new());
    let mut registry = clocked_registry(&clock);
    let id = DataIdentifier::new("brokerA", "room/temp");
    let guard = Arc::new(UpdateGuard::new("tempCheck", id.clone(), vec![Arc::new(RangeAlarm::at_interval(-10.0, 10.0))]));
    registry.add_guarded_device("kitchen", Arc::new(DeviceGuard::new(None, vec![guard])));

    let report1 = registry.on_message(&id, b"5");
    let alarm1 = report1[0].alarms().next().unwrap();
    assert!(!alarm1.track.active);
    assert!(!alarm1.track.changed);

    let report2 = registry.on_message(&id, b"25");
    let alarm2 = report2[0].alarms().next().unwrap();
    assert!(alarm2.track.active);
    assert!(alarm2.track.changed);
    assert!(alarm2.track.message.as_deref().unwrap().contains("25"));

    let report3 = registry.on_message(&id, b"0");
    let alarm3 = report3[0].alarms().next().unwrap();
    assert!(!alarm3.track.active);
    assert!(alarm3.track.changed);
}

#[test]
fn s2_timeout_fires_after_silence() {
    let clock = Arc::new(TestClock::new());
    let mut registry = clocked_registry(&clock);
    let id = DataIdentifier::new("brokerA", "room/heartbeat");
    let guard = Arc::new(UpdateGuard::new("heartbeat", id, vec![Arc::new(TimeoutAlarm::from_seconds(2))]));
    registry.add_guarded_device("sensor", Arc::new(DeviceGuard::new(None, vec![guard])));

    // Seed the timestamp with a first tick, matching a fresh process with no
    // messages yet.
    assert!(registry.on_periodic().is_empty());

    clock.advance(Duration::from_secs(3));
    let reports = registry.on_periodic();
    assert_eq!(reports.len(), 1);
    let alarm = reports[0].alarms().next().unwrap();
    assert!(alarm.track.active);
    let message = alarm.track.message.as_deref().unwrap();
    assert!(message.contains("timeouted"));
}

#[test]
fn s3_flooding() {
    let clock = Arc::new(TestClock::new());
    let mut registry = clocked_registry(&clock);
    let id = DataIdentifier::new("brokerA", "room/flood");
    let guard = Arc::new(UpdateGuard::new("floodCheck", id.clone(), vec![Arc::new(FloodingAlarm::from_seconds(1))]));
    registry.add_guarded_device("pump", Arc::new(DeviceGuard::new(None, vec![guard])));

    let report1 = registry.on_message(&id, b"a");
    assert!(!report1[0].alarms().next().unwrap().track.active);

    clock.advance(Duration::from_millis(500));
    let report2 = registry.on_message(&id, b"b");
    let alarm2 = report2[0].alarms().next().unwrap();
    assert!(alarm2.track.active);
    assert!(alarm2.track.changed);

    clock.advance(Duration::from_millis(1500));
    let report3 = registry.on_message(&id, b"c");
    let alarm3 = report3[0].alarms().next().unwrap();
    assert!(!alarm3.track.active);
    assert!(alarm3.track.changed);
}

#[test]
fn s4_presence() {
    let clock = Arc::new(TestClock::new());
    let mut registry = clocked_registry(&clock);
    let presence_id = DataIdentifier::new("brokerA", "room/presence");
    let presence = DevicePresence {
        identifier: presence_id.clone(),
        online: "online".to_string(),
        offline: "offline".to_string(),
    };
    registry.add_guarded_device("kitchen", Arc::new(DeviceGuard::new(Some(presence), vec![])));

    let initial = registry.snapshot_all();
    let (_, track) = initial[0].presence().unwrap();
    assert!(track.active);
    assert_eq!(track.message.as_deref(), Some("presence not yet received"));

    let online_reports = registry.on_message(&presence_id, b"online");
    let (_, track) = online_reports[0].presence().unwrap();
    assert!(!track.active);
    assert!(track.changed);

    let garbled_reports = registry.on_message(&presence_id, b"garbled");
    let (_, track) = garbled_reports[0].presence().unwrap();
    assert!(track.active);
    assert!(track.message.as_deref().unwrap().contains("unexpected") || track.message.as_deref().unwrap().to_lowercase().contains("unexpected"));
}

#[test]
fn s5_streaming_session_init_then_update_frame() {
    let clock = Arc::new(TestClock::new());
    let mut registry = clocked_registry(&clock);
    let id = DataIdentifier::new("brokerA", "room/temp");
    let guard = Arc::new(UpdateGuard::new("tempCheck", id.clone(), vec![Arc::new(RangeAlarm::at_interval(-10.0, 10.0))]));
    registry.add_guarded_device("kitchen", Arc::new(DeviceGuard::new(None, vec![guard])));

    // Equivalent of "S1-report2": drive the alarm into a failing state before
    // any session connects.
    registry.on_message(&id, b"25");

    // Two sessions connect "at the same time" and both ask for the current
    // snapshot — they must see identical state.
    let snapshot = RegistrySnapshot {
        reports: registry.snapshot_all(),
        guards: registry.guard_handles(),
    };
    let init_frame_a = build_init_frame(&snapshot).unwrap();
    let init_frame_b = build_init_frame(&snapshot).unwrap();
    assert_eq!(init_frame_a, init_frame_b);
    assert!(init_frame_a.contains("\"feed\":\"init\""));
    assert!(init_frame_a.contains("\"status\":\"error\""));

    // A subsequent message clears the alarm; both sessions' update frame
    // comes from the same single report, so they're identical too, and it
    // mentions only this device.
    let reports = registry.on_message(&id, b"1");
    assert_eq!(reports.len(), 1);
    let update_frame = build_update_frame(&reports[0]).unwrap().unwrap();
    assert!(update_frame.contains("\"feed\":\"update\""));
    assert!(update_frame.contains("\"status\":\"ok\""));
    assert!(update_frame.contains("kitchen"));
}

#[test]
fn s6_missing_brokers_section_is_a_config_error() {
    let dir = std::env::temp_dir().join(format!("mqguard-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("no-brokers.conf");
    std::fs::write(
        &path,
        r#"
[Devices]
Enabled = kitchen

[kitchen]
Guard = kitchenGuards

[kitchenGuards]
main kitchen/temp = tempCheck

[tempCheck]
Type = numeric

[Reporters]
Enabled = log

[log]
Type = log
LogFile = /var/log/mqguard.log
"#,
    )
    .unwrap();

    let result = config::load(&path);
    assert!(result.is_err());
    let message = result.unwrap_err().to_string();
    assert!(message.contains("Brokers"));

    std::fs::remove_file(&path).ok();
}
