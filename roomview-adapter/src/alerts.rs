use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;

use roomview::{RoomAlert, RosterEvent};

/// A platform notification service (a D-Bus notification daemon, a toast API, ...).
pub trait AlertBackend {
    /// Shows a notification and returns the id the platform assigned to it.
    fn show(&mut self, summary: &str, body: &str, icon: Option<&str>) -> u32;
}

/// What a posted alert points at.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlertTarget {
    pub room_id: String,
    pub event_id: String,
}

/// Posts [`RoomAlert`]s to a backend and remembers which room/event each notification is about,
/// until the platform reports it closed.
#[derive(Debug, Default)]
pub struct AlertManager<B> {
    backend: B,
    posted: BTreeMap<u32, AlertTarget>,
}

impl<B: AlertBackend> AlertManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            posted: BTreeMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Shows `alert`: the room name as summary, "sender: text" as body.
    pub fn post(&mut self, alert: &RoomAlert) -> u32 {
        let body = format!("{}: {}", alert.sender_name, alert.text);
        let id = self
            .backend
            .show(&alert.room_name, &body, alert.avatar.as_deref());
        adebug!(id, room = %alert.room_id, event = %alert.event_id, "alert posted");
        self.posted.insert(
            id,
            AlertTarget {
                room_id: alert.room_id.clone(),
                event_id: alert.event_id.clone(),
            },
        );
        id
    }

    /// Posts the alert carried by a roster event, if any.
    pub fn handle(&mut self, event: &RosterEvent) -> Option<u32> {
        match event {
            RosterEvent::Alert(alert) => Some(self.post(alert)),
            RosterEvent::RoomAdded(_) | RosterEvent::NotificationCountChanged(_) => None,
        }
    }

    /// The user activated notification `id`; returns the room and event to open.
    pub fn action_invoked(&self, id: u32, _action: &str) -> Option<&AlertTarget> {
        let target = self.posted.get(&id);
        if target.is_none() {
            awarn!(id, "action on an unknown notification");
        }
        target
    }

    /// The platform closed notification `id` (expired, dismissed, ...).
    pub fn notification_closed(&mut self, id: u32, _reason: u32) -> Option<AlertTarget> {
        self.posted.remove(&id)
    }

    pub fn target(&self, id: u32) -> Option<&AlertTarget> {
        self.posted.get(&id)
    }

    /// Notifications posted and not yet closed.
    pub fn open_count(&self) -> usize {
        self.posted.len()
    }
}
