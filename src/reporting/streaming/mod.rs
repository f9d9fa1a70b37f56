//! Shared machinery for the two streaming transports (raw TCP, WebSocket):
//! JSON frame encoding and the session set every live client is tracked in.
//!
//! Session lifecycle: CONNECTED -> SNAPSHOT_SENT -> STREAMING -> CLOSING ->
//! CLOSED. This module only models the CONNECTED/SNAPSHOT_SENT/STREAMING
//! transitions (building the two frame kinds); CLOSING/CLOSED is the
//! transport's own loop noticing its channel closed or its socket erroring.

pub mod tcp;
pub mod websocket;

use crate::supervisor::RegistrySnapshot;
use crate::track::DeviceReport;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

/// Per-session outgoing queue capacity. A session whose consumer falls this
/// far behind is disconnected rather than allowed to buffer unboundedly —
/// see the crate's documented backpressure policy.
pub const SESSION_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Serialize)]
struct GuardRef<'a> {
    broker: &'a str,
    topic: &'a str,
}

#[derive(Debug, Serialize)]
struct ReasonFrame<'a> {
    guard: GuardRef<'a>,
    alarm: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ReasonsFrame<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    presence: Option<ReasonFrame<'a>>,
    guards: Vec<ReasonFrame<'a>>,
}

#[derive(Debug, Serialize)]
struct DeviceFrame<'a> {
    name: &'a str,
    status: &'static str,
    reasons: ReasonsFrame<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "feed")]
enum Frame<'a> {
    #[serde(rename = "init")]
    Init { devices: Vec<DeviceFrame<'a>>, brokers: Vec<&'a str> },
    #[serde(rename = "update")]
    Update { devices: Vec<DeviceFrame<'a>> },
}

fn status(active: bool) -> &'static str {
    if active {
        "error"
    } else {
        "ok"
    }
}

fn full_device_frame(report: &DeviceReport) -> DeviceFrame<'_> {
    let presence = report.presence().map(|(declared, track)| ReasonFrame {
        guard: GuardRef {
            broker: &declared.identifier.broker,
            topic: &declared.identifier.topic,
        },
        alarm: "Presence",
        status: status(track.active),
        message: track.message.as_deref(),
    });
    let guards = report
        .alarms()
        .map(|alarm| ReasonFrame {
            guard: GuardRef {
                broker: &alarm.identifier.broker,
                topic: &alarm.identifier.topic,
            },
            alarm: alarm.alarm_name,
            status: status(alarm.track.active),
            message: alarm.track.message.as_deref(),
        })
        .collect();
    let device_failing = report.has_presence_failure() || report.has_alarm_failures();
    DeviceFrame {
        name: &report.device,
        status: status(device_failing),
        reasons: ReasonsFrame { presence, guards },
    }
}

fn changed_device_frame(report: &DeviceReport) -> Option<DeviceFrame<'_>> {
    if !report.has_any_changes() {
        return None;
    }
    let presence = if report.has_presence_update() {
        report.presence().map(|(declared, track)| ReasonFrame {
            guard: GuardRef {
                broker: &declared.identifier.broker,
                topic: &declared.identifier.topic,
            },
            alarm: "Presence",
            status: status(track.active),
            message: track.message.as_deref(),
        })
    } else {
        None
    };
    let guards = report
        .changed_alarms()
        .map(|alarm| ReasonFrame {
            guard: GuardRef {
                broker: &alarm.identifier.broker,
                topic: &alarm.identifier.topic,
            },
            alarm: alarm.alarm_name,
            status: status(alarm.track.active),
            message: alarm.track.message.as_deref(),
        })
        .collect();
    let device_failing = report.has_presence_failure() || report.has_alarm_failures();
    Some(DeviceFrame {
        name: &report.device,
        status: status(device_failing),
        reasons: ReasonsFrame { presence, guards },
    })
}

/// Builds the one-shot initial snapshot frame a session sends right after
/// accept, reflecting registry state as of the moment it was requested.
pub fn build_init_frame(snapshot: &RegistrySnapshot) -> serde_json::Result<String> {
    let mut brokers: Vec<&str> = snapshot
        .guards
        .iter()
        .flat_map(|(_, guard)| guard.update_guards().iter().map(|ug| ug.identifier.broker.as_ref()))
        .collect();
    brokers.sort_unstable();
    brokers.dedup();
    let devices = snapshot.reports.iter().map(full_device_frame).collect();
    serde_json::to_string(&Frame::Init { devices, brokers })
}

/// Builds an incremental update frame for one report, or `None` if the
/// report carries nothing worth sending (mirrors the line reporter's gate).
pub fn build_update_frame(report: &DeviceReport) -> Option<serde_json::Result<String>> {
    changed_device_frame(report).map(|device| serde_json::to_string(&Frame::Update { devices: vec![device] }))
}

/// The set of live sessions for one streaming reporter. Broadcasting is a
/// non-blocking `try_send` to every session; a session whose queue is full
/// is dropped from the set immediately, which closes its channel and lets
/// that session's own task notice and shut down.
///
/// Also owns a `TaskTracker` so `stop()` can signal every session to close
/// and then `join()` can wait for them all to actually finish, per the
/// session-lifecycle contract's CLOSING -> CLOSED transition.
pub struct SessionSet {
    sessions: parking_lot::Mutex<HashMap<u64, mpsc::Sender<String>>>,
    next_id: AtomicU64,
    tasks: TaskTracker,
}

impl SessionSet {
    pub fn new() -> Self {
        SessionSet {
            sessions: parking_lot::Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            tasks: TaskTracker::new(),
        }
    }

    pub fn insert(&self, sender: mpsc::Sender<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions.lock().insert(id, sender);
        id
    }

    pub fn remove(&self, id: u64) {
        self.sessions.lock().remove(&id);
    }

    pub fn broadcast(&self, frame: String) {
        let mut sessions = self.sessions.lock();
        sessions.retain(|_, tx| tx.try_send(frame.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawns a future as a tracked session task. Used by the raw TCP
    /// transport, which spawns its own session tasks directly.
    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tasks.spawn(future)
    }

    /// Wraps a future so the tracker observes its completion without
    /// spawning it. Used by the WebSocket transport, whose session future is
    /// spawned internally by `axum`'s upgrade machinery rather than by us.
    pub fn track_future<F>(&self, future: F) -> impl Future<Output = F::Output> + Send
    where
        F: Future + Send,
    {
        self.tasks.track_future(future)
    }

    /// Signals every live session to close: drops every sender (so each
    /// session's queue read returns `None` and its loop exits) and closes
    /// the tracker so `join` knows no further sessions will be tracked.
    pub fn close_all(&self) {
        self.sessions.lock().clear();
        self.tasks.close();
    }

    /// Waits for every tracked session task to finish. Only resolves once
    /// `close_all` has been called and every already-running session has
    /// exited.
    pub async fn join(&self) {
        self.tasks.wait().await;
    }
}

impl Default for SessionSet {
    fn default() -> Self {
        SessionSet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::RangeAlarm;
    use crate::guard::{DeviceGuard, UpdateGuard};
    use crate::identifier::DataIdentifier;
    use crate::registry::DeviceRegistry;
    use crate::time::SystemClock;
    use std::sync::Arc;

    #[test]
    fn update_frame_is_none_when_nothing_changed() {
        let mut registry = DeviceRegistry::new(Arc::new(SystemClock));
        let id = DataIdentifier::new("b", "room/temp");
        let guard = Arc::new(UpdateGuard::new("g", id.clone(), vec![Arc::new(RangeAlarm::at_interval(-10.0, 10.0))]));
        registry.add_guarded_device("d", Arc::new(DeviceGuard::new(None, vec![guard])));
        let reports = registry.on_message(&id, b"5");
        assert!(build_update_frame(&reports[0]).is_none());
    }

    #[test]
    fn update_frame_is_some_with_error_status_when_alarm_fires() {
        let mut registry = DeviceRegistry::new(Arc::new(SystemClock));
        let id = DataIdentifier::new("b", "room/temp");
        let guard = Arc::new(UpdateGuard::new("g", id.clone(), vec![Arc::new(RangeAlarm::at_interval(-10.0, 10.0))]));
        registry.add_guarded_device("d", Arc::new(DeviceGuard::new(None, vec![guard])));
        let reports = registry.on_message(&id, b"100");
        let frame = build_update_frame(&reports[0]).unwrap().unwrap();
        assert!(frame.contains("\"feed\":\"update\""));
        assert!(frame.contains("\"status\":\"error\""));
    }

    #[test]
    fn full_queue_drops_the_session() {
        let set = SessionSet::new();
        let (tx, _rx) = mpsc::channel(1);
        set.insert(tx);
        set.broadcast("one".to_string());
        assert_eq!(set.len(), 1);
        set.broadcast("two".to_string());
        assert_eq!(set.len(), 0);
    }
}
