//! `UpdateGuard` and `DeviceGuard`: the immutable, configuration-time guard
//! tree that `DeviceRegistry` walks on every ingress event.

use crate::alarms::{Alarm, AlarmKind, AlarmOutcome, PresenceAlarm};
use crate::identifier::DataIdentifier;
use crate::time::Clock;
use std::sync::Arc;

/// One alarm's verdict, tagged with enough context for the registry to
/// locate its `AlarmTrack` and for reporters to render it.
#[derive(Debug, Clone)]
pub struct AlarmEvent {
    pub identifier: DataIdentifier,
    pub guard_name: Arc<str>,
    pub alarm_name: &'static str,
    pub outcome: AlarmOutcome,
}

/// Declares a device's presence topic and its online/offline tokens. Absent
/// when a device has no presence tracking.
#[derive(Clone)]
pub struct DevicePresence {
    pub identifier: DataIdentifier,
    pub online: String,
    pub offline: String,
}

/// Checks for a single data identifier: a named bundle of message-driven and
/// periodic alarms. Built once at configuration load and never mutated
/// (aside from the alarms' own interior-mutable timestamps).
pub struct UpdateGuard {
    pub name: Arc<str>,
    pub identifier: DataIdentifier,
    message_alarms: Vec<Arc<dyn Alarm>>,
    periodic_alarms: Vec<Arc<dyn Alarm>>,
}

impl UpdateGuard {
    pub fn new(name: impl Into<Arc<str>>, identifier: DataIdentifier, alarms: Vec<Arc<dyn Alarm>>) -> Self {
        let mut message_alarms = Vec::new();
        let mut periodic_alarms = Vec::new();
        for alarm in alarms {
            match alarm.kind() {
                AlarmKind::MessageDriven => message_alarms.push(alarm),
                AlarmKind::Periodic => periodic_alarms.push(alarm),
            }
        }
        UpdateGuard {
            name: name.into(),
            identifier,
            message_alarms,
            periodic_alarms,
        }
    }

    pub fn is_relevant(&self, identifier: &DataIdentifier) -> bool {
        &self.identifier == identifier
    }

    /// Evaluates one incoming message. Periodic alarms are notified first so
    /// a timeout can observe the very message that would otherwise make it
    /// look silent; any alarm that reports itself deactivated as a result is
    /// recorded as clear.
    pub fn get_update_check(
        &self,
        identifier: &DataIdentifier,
        payload: &[u8],
        clock: &dyn Clock,
    ) -> Vec<(&'static str, AlarmOutcome)> {
        let mut results = Vec::with_capacity(self.periodic_alarms.len() + self.message_alarms.len());
        for alarm in &self.periodic_alarms {
            if alarm.notify_message(identifier, payload, clock) {
                results.push((alarm.name(), AlarmOutcome::clear()));
            }
        }
        for alarm in &self.message_alarms {
            let outcome = alarm.check_message(identifier, payload, clock);
            results.push((alarm.name(), outcome));
        }
        results
    }

    pub fn get_periodic_check(&self, clock: &dyn Clock) -> Vec<(&'static str, AlarmOutcome)> {
        self.periodic_alarms
            .iter()
            .map(|alarm| (alarm.name(), alarm.check_periodic(clock)))
            .collect()
    }

    /// All alarms, message-driven first then periodic — the stable order
    /// used to seed tracking tables and to build initial snapshots.
    pub fn alarms(&self) -> impl Iterator<Item = &Arc<dyn Alarm>> {
        self.message_alarms.iter().chain(self.periodic_alarms.iter())
    }
}

/// Groups a device's update-guards and its optional presence check.
pub struct DeviceGuard {
    presence_declaration: Option<DevicePresence>,
    presence_alarm: Option<Arc<PresenceAlarm>>,
    update_guards: Vec<Arc<UpdateGuard>>,
}

impl DeviceGuard {
    pub fn new(presence: Option<DevicePresence>, update_guards: Vec<Arc<UpdateGuard>>) -> Self {
        let presence_alarm = presence
            .as_ref()
            .map(|declared| Arc::new(PresenceAlarm::new(declared.online.clone(), declared.offline.clone())));
        DeviceGuard {
            presence_declaration: presence,
            presence_alarm,
            update_guards,
        }
    }

    pub fn update_guards(&self) -> &[Arc<UpdateGuard>] {
        &self.update_guards
    }

    pub fn presence_declaration(&self) -> Option<&DevicePresence> {
        self.presence_declaration.as_ref()
    }

    pub fn presence_identifier(&self) -> Option<&DataIdentifier> {
        self.presence_declaration.as_ref().map(|declared| &declared.identifier)
    }

    pub fn presence_alarm(&self) -> Option<&Arc<PresenceAlarm>> {
        self.presence_alarm.as_ref()
    }

    /// Evaluates every relevant update-guard (and the presence check, if
    /// relevant) against an incoming message. Multiple guards may share an
    /// identifier; every one of them runs independently.
    pub fn message_received(
        &self,
        identifier: &DataIdentifier,
        payload: &[u8],
        clock: &dyn Clock,
    ) -> (Option<AlarmOutcome>, Vec<AlarmEvent>) {
        let presence_outcome = match (&self.presence_declaration, &self.presence_alarm) {
            (Some(declared), Some(alarm)) if &declared.identifier == identifier => {
                Some(alarm.check_message(identifier, payload, clock))
            }
            _ => None,
        };

        let mut events = Vec::new();
        for guard in &self.update_guards {
            if !guard.is_relevant(identifier) {
                continue;
            }
            for (alarm_name, outcome) in guard.get_update_check(identifier, payload, clock) {
                events.push(AlarmEvent {
                    identifier: identifier.clone(),
                    guard_name: guard.name.clone(),
                    alarm_name,
                    outcome,
                });
            }
        }

        (presence_outcome, events)
    }

    /// Wall-clock-driven pass over every update-guard's periodic alarms.
    /// Presence is purely message-driven and never appears here.
    pub fn on_periodic(&self, clock: &dyn Clock) -> Vec<AlarmEvent> {
        let mut events = Vec::new();
        for guard in &self.update_guards {
            for (alarm_name, outcome) in guard.get_periodic_check(clock) {
                events.push(AlarmEvent {
                    identifier: guard.identifier.clone(),
                    guard_name: guard.name.clone(),
                    alarm_name,
                    outcome,
                });
            }
        }
        events
    }
}
