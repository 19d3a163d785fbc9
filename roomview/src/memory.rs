//! In-memory reference sources.
//!
//! [`MemoryTimeline`] and [`MemoryRooms`] own their data and drive a projection through the
//! exact notification protocol on every mutation. They are meant for demos, tests and adapters
//! prototyping against the projections without a live connection.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use chrono::{DateTime, Utc};

use crate::event::{DeliveryStatus, Event, FileTransferInfo, PendingEvent, RedactionInfo};
use crate::render::TextContext;
use crate::roster::{RoomSignal, RosterProjection};
use crate::rows::{RowSpace, Segment};
use crate::source::{EventSource, JoinState, RoomHandle, RoomSource, RoomView, TimelineIndex};
use crate::timeline::TimelineProjection;

/// A room timeline held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryTimeline {
    room_id: String,
    local_user_id: String,
    /// Chronological, oldest first.
    committed: VecDeque<Event>,
    first_index: TimelineIndex,
    /// Oldest first.
    pending: Vec<PendingEvent>,
    read_marker: Option<String>,
    user_markers: BTreeMap<String, String>,
    transfers: BTreeMap<String, FileTransferInfo>,
    highlighted: Vec<String>,
    names: BTreeMap<String, String>,
    next_txn: u64,
}

impl MemoryTimeline {
    pub fn new(room_id: impl Into<String>, local_user_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            local_user_id: local_user_id.into(),
            ..Self::default()
        }
    }

    /// Seeds committed events (chronological order) without notifying anyone. Use before attaching.
    pub fn with_events(mut self, events: impl IntoIterator<Item = Event>) -> Self {
        self.committed.extend(events);
        self
    }

    pub fn set_member_name(&mut self, user_id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(user_id.into(), name.into());
    }

    pub fn set_highlighted(&mut self, event_id: impl Into<String>) {
        self.highlighted.push(event_id.into());
    }

    fn space(&self) -> RowSpace {
        RowSpace::new(self.pending.len(), self.committed.len())
    }

    /// Appends `events` (chronological order) at the live end.
    pub fn add_new_messages(&mut self, proj: &mut TimelineProjection, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        proj.new_messages_about_to_add(self, events.len());
        let lowest = self.max_timeline_index() + 1;
        self.committed.extend(events);
        let biggest = self.max_timeline_index();
        proj.messages_added(self, lowest, biggest);
    }

    /// Prepends `events` (chronological order) at the old end.
    pub fn add_historical_messages(&mut self, proj: &mut TimelineProjection, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let n = events.len();
        proj.historical_messages_about_to_add(self, n);
        for event in events.into_iter().rev() {
            self.committed.push_front(event);
        }
        self.first_index -= n as TimelineIndex;
        proj.messages_added(self, self.first_index, self.first_index + n as TimelineIndex - 1);
    }

    /// Queues a local echo; returns its transaction id.
    pub fn add_pending(
        &mut self,
        proj: &mut TimelineProjection,
        event: Event,
        now: DateTime<Utc>,
    ) -> String {
        self.next_txn += 1;
        let txn = format!("txn{}", self.next_txn);
        let mut event = event.with_transaction_id(txn.clone());
        event.id.clear();
        proj.pending_event_about_to_add(self);
        self.pending.push(PendingEvent::new(event, now));
        proj.pending_event_added(self);
        txn
    }

    /// Moves the pending event at oldest-first `offset` to the live end of the committed timeline.
    pub fn merge_pending(&mut self, proj: &mut TimelineProjection, offset: usize, event_id: &str) {
        if offset >= self.pending.len() {
            return;
        }
        proj.pending_event_about_to_merge(self, offset);
        let mut event = self.pending.remove(offset).event;
        event.id = String::from(event_id);
        self.committed.push_back(event);
        proj.pending_event_merged(self);
    }

    /// Drops the pending event at oldest-first `offset`.
    pub fn discard_pending(&mut self, proj: &mut TimelineProjection, offset: usize) {
        let Some(row) = self.space().to_row(Segment::Pending, offset) else {
            return;
        };
        proj.pending_event_about_to_discard(self, row);
        self.pending.remove(offset);
        proj.pending_event_discarded(self);
    }

    pub fn set_pending_status(
        &mut self,
        proj: &mut TimelineProjection,
        offset: usize,
        status: DeliveryStatus,
    ) {
        let Some(row) = self.space().to_row(Segment::Pending, offset) else {
            return;
        };
        if let Some(p) = self.pending.get_mut(offset) {
            p.status = status;
            proj.pending_event_changed(self, row);
        }
    }

    fn committed_mut(&mut self, event_id: &str) -> Option<&mut Event> {
        self.committed.iter_mut().find(|e| e.id == event_id)
    }

    /// Replaces a committed event's content in place.
    pub fn replace_event(&mut self, proj: &mut TimelineProjection, event: Event) {
        let id = event.id.clone();
        if let Some(slot) = self.committed_mut(&id) {
            *slot = event;
        }
        proj.replaced_event(self, &id);
    }

    pub fn redact(
        &mut self,
        proj: &mut TimelineProjection,
        event_id: &str,
        redaction: RedactionInfo,
    ) {
        if let Some(e) = self.committed_mut(event_id) {
            e.redacted_because = Some(redaction);
        }
        proj.replaced_event(self, event_id);
    }

    pub fn move_read_marker(&mut self, proj: &mut TimelineProjection, event_id: &str) {
        self.read_marker = Some(String::from(event_id));
        proj.read_marker_moved(self);
    }

    pub fn move_user_marker(&mut self, proj: &mut TimelineProjection, user_id: &str, event_id: &str) {
        let from = self
            .user_markers
            .insert(String::from(user_id), String::from(event_id))
            .unwrap_or_default();
        proj.read_marker_for_user_moved(self, user_id, &from, event_id);
    }

    pub fn set_file_transfer(
        &mut self,
        proj: &mut TimelineProjection,
        event_id: &str,
        info: FileTransferInfo,
    ) {
        self.transfers.insert(String::from(event_id), info);
        proj.file_transfer_changed(self, event_id);
    }
}

impl TextContext for MemoryTimeline {
    fn member_name(&self, user_id: &str) -> String {
        self.names
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| String::from(user_id))
    }
}

impl EventSource for MemoryTimeline {
    fn room_id(&self) -> &str {
        &self.room_id
    }

    fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn timeline_size(&self) -> usize {
        self.committed.len()
    }

    fn pending_event(&self, offset: usize) -> Option<&PendingEvent> {
        self.pending.get(offset)
    }

    fn timeline_event(&self, offset: usize) -> Option<&Event> {
        let idx = self.committed.len().checked_sub(offset + 1)?;
        self.committed.get(idx)
    }

    fn find_in_timeline(&self, event_id: &str) -> Option<usize> {
        if event_id.is_empty() {
            return None;
        }
        self.committed
            .iter()
            .rev()
            .position(|e| e.id == event_id)
    }

    fn max_timeline_index(&self) -> TimelineIndex {
        self.first_index + self.committed.len() as TimelineIndex - 1
    }

    fn read_marker_event_id(&self) -> Option<&str> {
        self.read_marker.as_deref()
    }

    fn users_at_event(&self, event_id: &str) -> Vec<String> {
        self.user_markers
            .iter()
            .filter(|(_, e)| e.as_str() == event_id)
            .map(|(u, _)| u.clone())
            .collect()
    }

    fn is_event_highlighted(&self, event: &Event) -> bool {
        !event.id.is_empty() && self.highlighted.contains(&event.id)
    }

    fn file_transfer(&self, event_id: &str) -> Option<FileTransferInfo> {
        self.transfers.get(event_id).copied()
    }
}

/// A room object held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryRoom {
    pub id: String,
    pub name: String,
    pub avatar_media_id: Option<String>,
    pub topic: String,
    pub join_state: JoinState,
    pub successor_id: Option<String>,
    pub favourite: bool,
    pub direct: bool,
    pub low_priority: bool,
    pub unread_count: Option<u32>,
    pub notification_count: u32,
    pub highlight_count: u32,
    pub last_active: Option<DateTime<Utc>>,
    /// Chronological, oldest first.
    pub events: Vec<Event>,
    pub local_user_id: String,
    pub names: BTreeMap<String, String>,
}

impl MemoryRoom {
    pub fn new(id: impl Into<String>, name: impl Into<String>, local_user_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar_media_id: None,
            topic: String::new(),
            join_state: JoinState::Join,
            successor_id: None,
            favourite: false,
            direct: false,
            low_priority: false,
            unread_count: None,
            notification_count: 0,
            highlight_count: 0,
            last_active: None,
            events: Vec::new(),
            local_user_id: local_user_id.into(),
            names: BTreeMap::new(),
        }
    }
}

impl TextContext for MemoryRoom {
    fn member_name(&self, user_id: &str) -> String {
        self.names
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| String::from(user_id))
    }
}

impl RoomView for MemoryRoom {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn avatar_media_id(&self) -> Option<&str> {
        self.avatar_media_id.as_deref()
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    fn join_state(&self) -> JoinState {
        self.join_state
    }

    fn successor_id(&self) -> Option<&str> {
        self.successor_id.as_deref()
    }

    fn is_favourite(&self) -> bool {
        self.favourite
    }

    fn is_direct_chat(&self) -> bool {
        self.direct
    }

    fn is_low_priority(&self) -> bool {
        self.low_priority
    }

    fn unread_count(&self) -> Option<u32> {
        self.unread_count
    }

    fn notification_count(&self) -> u32 {
        self.notification_count
    }

    fn highlight_count(&self) -> u32 {
        self.highlight_count
    }

    fn last_active_time(&self) -> Option<DateTime<Utc>> {
        self.last_active
    }

    fn last_event(&self) -> Option<&Event> {
        self.events.last()
    }

    fn local_user_id(&self) -> &str {
        &self.local_user_id
    }
}

/// A connection's room collection held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryRooms {
    rooms: BTreeMap<RoomHandle, MemoryRoom>,
    order: Vec<RoomHandle>,
    next_handle: u64,
}

impl MemoryRooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `room` without notifying anyone; returns its new handle.
    pub fn insert(&mut self, room: MemoryRoom) -> RoomHandle {
        self.next_handle += 1;
        let handle = RoomHandle(self.next_handle);
        self.rooms.insert(handle, room);
        self.order.push(handle);
        handle
    }

    pub fn get_mut(&mut self, handle: RoomHandle) -> Option<&mut MemoryRoom> {
        self.rooms.get_mut(&handle)
    }

    /// Adds a room and reports it as newly joined.
    pub fn join(&mut self, roster: &mut RosterProjection, room: MemoryRoom) -> RoomHandle {
        let handle = self.insert(room);
        roster.update_room(self, handle, None);
        handle
    }

    /// Supersedes `prev` with a new object for the same logical room.
    pub fn supersede(
        &mut self,
        roster: &mut RosterProjection,
        prev: RoomHandle,
        room: MemoryRoom,
    ) -> RoomHandle {
        let handle = self.insert(room);
        roster.update_room(self, handle, Some(prev));
        self.rooms.remove(&prev);
        self.order.retain(|&h| h != prev);
        handle
    }

    pub fn delete(&mut self, roster: &mut RosterProjection, handle: RoomHandle) {
        roster.delete_room(self, handle);
        self.rooms.remove(&handle);
        self.order.retain(|&h| h != handle);
    }

    /// Mutates a room and delivers `signal` for it.
    pub fn update(
        &mut self,
        roster: &mut RosterProjection,
        handle: RoomHandle,
        signal: RoomSignal,
        f: impl FnOnce(&mut MemoryRoom),
    ) {
        if let Some(room) = self.rooms.get_mut(&handle) {
            f(room);
        }
        roster.room_signal(self, handle, signal);
    }
}

impl RoomSource for MemoryRooms {
    type Room = MemoryRoom;

    fn room(&self, handle: RoomHandle) -> Option<&MemoryRoom> {
        self.rooms.get(&handle)
    }

    fn all_rooms(&self) -> Vec<RoomHandle> {
        self.order.clone()
    }

    fn find_room(&self, room_id: &str) -> Option<RoomHandle> {
        self.order
            .iter()
            .copied()
            .find(|h| self.rooms.get(h).is_some_and(|r| r.id == room_id))
    }
}
