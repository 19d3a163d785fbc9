use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;

use chrono::{DateTime, Utc};

use crate::render::TextContext;
use crate::notify::{ChangeNotifier, Fields, ModelChange, StructuralChange, SubscriptionId};
use crate::options::RosterOptions;
use crate::source::{RoomHandle, RoomSource, RoomView};

/// Room category; the discriminant doubles as the section sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoomCategory {
    Invited = 1,
    Favorite = 2,
    Direct = 3,
    Normal = 4,
    Deprioritized = 5,
}

impl RoomCategory {
    pub const ALL: [RoomCategory; 5] = [
        RoomCategory::Invited,
        RoomCategory::Favorite,
        RoomCategory::Direct,
        RoomCategory::Normal,
        RoomCategory::Deprioritized,
    ];

    /// First match wins: invited, favourite, direct, low priority, then normal.
    pub fn of<R: RoomView + ?Sized>(room: &R) -> Self {
        if room.join_state() == crate::source::JoinState::Invite {
            Self::Invited
        } else if room.is_favourite() {
            Self::Favorite
        } else if room.is_direct_chat() {
            Self::Direct
        } else if room.is_low_priority() {
            Self::Deprioritized
        } else {
            Self::Normal
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Invited => "Invited",
            Self::Favorite => "Favorite",
            Self::Direct => "Direct Messages",
            Self::Normal => "Normal",
            Self::Deprioritized => "Low priority",
        }
    }
}

/// Fields a consumer can query per roster row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoomField {
    Name,
    Avatar,
    Topic,
    Category,
    UnreadCount,
    NotificationCount,
    HighlightCount,
    LastEvent,
    LastActiveTime,
    JoinState,
    CategoryVisible,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoomValue {
    Text(String),
    Avatar(Option<String>),
    Category(RoomCategory),
    Count(Option<u32>),
    Time(Option<DateTime<Utc>>),
    Flag(bool),
}

/// Per-room change notifications from the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoomSignal {
    DisplayNameChanged,
    UnreadMessagesChanged,
    NotificationCountChanged,
    HighlightCountChanged,
    AvatarChanged,
    TagsChanged,
    JoinStateChanged,
    AddedMessages,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AlertKind {
    Message,
    Highlight,
}

/// A notable event worth alerting the user about outside the room list.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoomAlert {
    pub kind: AlertKind,
    pub room_id: String,
    pub event_id: String,
    pub room_name: String,
    pub sender_name: String,
    pub text: String,
    pub avatar: Option<String>,
}

/// Side-channel notifications that are not row changes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RosterEvent {
    RoomAdded(RoomHandle),
    NotificationCountChanged(u64),
    Alert(RoomAlert),
}

pub type RosterEventListener = Box<dyn FnMut(&RosterEvent)>;

/// Projects the connection's rooms onto a row space, in connection order.
pub struct RosterProjection {
    options: RosterOptions,
    rooms: Vec<RoomHandle>,
    subscribed: BTreeSet<RoomHandle>,
    /// Last seen (notification, highlight) counts per room; alerts fire on increases only.
    seen_counts: BTreeMap<RoomHandle, (u32, u32)>,
    category_visibility: BTreeMap<RoomCategory, bool>,
    notification_count: u64,
    notifier: ChangeNotifier<RoomField>,
    event_listeners: Vec<RosterEventListener>,
}

impl Default for RosterProjection {
    fn default() -> Self {
        Self::new(RosterOptions::default())
    }
}

impl core::fmt::Debug for RosterProjection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RosterProjection")
            .field("options", &self.options)
            .field("rooms", &self.rooms)
            .field("category_visibility", &self.category_visibility)
            .field("notification_count", &self.notification_count)
            .field("notifier", &self.notifier)
            .finish()
    }
}

impl RosterProjection {
    pub fn new(options: RosterOptions) -> Self {
        Self {
            options,
            rooms: Vec::new(),
            subscribed: BTreeSet::new(),
            seen_counts: BTreeMap::new(),
            category_visibility: BTreeMap::new(),
            notification_count: 0,
            notifier: ChangeNotifier::new(),
            event_listeners: Vec::new(),
        }
    }

    pub fn options(&self) -> &RosterOptions {
        &self.options
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&ModelChange<RoomField>) + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn subscribe_events(&mut self, listener: impl FnMut(&RosterEvent) + 'static) {
        self.event_listeners.push(Box::new(listener));
    }

    fn emit(&mut self, event: RosterEvent) {
        for listener in self.event_listeners.iter_mut() {
            listener(&event);
        }
    }

    pub fn row_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_at(&self, row: usize) -> Option<RoomHandle> {
        self.rooms.get(row).copied()
    }

    pub fn row_of(&self, handle: RoomHandle) -> Option<usize> {
        self.rooms.iter().position(|&r| r == handle)
    }

    /// Whether per-room signals from `handle` are currently listened to.
    pub fn is_subscribed(&self, handle: RoomHandle) -> bool {
        self.subscribed.contains(&handle)
    }

    /// Sum of notification counts across all rooms.
    pub fn notification_count(&self) -> u64 {
        self.notification_count
    }

    pub fn is_category_visible(&self, category: RoomCategory) -> bool {
        self.category_visibility
            .get(&category)
            .copied()
            .unwrap_or(true)
    }

    /// Shows or hides a whole category. Announced as a reset since it may affect every row.
    pub fn set_category_visible(&mut self, category: RoomCategory, visible: bool) {
        if !self.notifier.begin(StructuralChange::Reset) {
            return;
        }
        self.category_visibility.insert(category, visible);
        self.notifier.end(self.rooms.len());
    }

    /// Binds to a connection's rooms, or clears the roster with `None`.
    pub fn set_connection<S: RoomSource>(&mut self, src: Option<&S>) {
        match src {
            Some(src) => self.reset(src),
            None => {
                rvdebug!("removing current connection");
                if !self.notifier.begin(StructuralChange::Reset) {
                    return;
                }
                self.rooms.clear();
                self.subscribed.clear();
                self.seen_counts.clear();
                self.notifier.end(0);
                self.set_notification_count(0);
            }
        }
    }

    /// Reloads every room from the connection.
    pub fn reset<S: RoomSource>(&mut self, src: &S) {
        if !self.notifier.begin(StructuralChange::Reset) {
            return;
        }
        self.rooms.clear();
        self.subscribed.clear();
        self.seen_counts.clear();
        for handle in src.all_rooms() {
            self.add_room(src, handle);
        }
        rvdebug!(rooms = self.rooms.len(), "roster reset");
        self.notifier.end(self.rooms.len());
        self.refresh_notification_count(src);
    }

    fn add_room<S: RoomSource>(&mut self, src: &S, handle: RoomHandle) {
        self.rooms.push(handle);
        self.subscribed.insert(handle);
        self.seen_counts.insert(handle, Self::counts(src, handle));
        self.emit(RosterEvent::RoomAdded(handle));
    }

    fn counts<S: RoomSource>(src: &S, handle: RoomHandle) -> (u32, u32) {
        src.room(handle)
            .map_or((0, 0), |r| (r.notification_count(), r.highlight_count()))
    }

    fn set_notification_count(&mut self, count: u64) {
        if self.notification_count != count {
            self.notification_count = count;
            self.emit(RosterEvent::NotificationCountChanged(count));
        }
    }

    pub fn refresh_notification_count<S: RoomSource>(&mut self, src: &S) {
        let count = self
            .rooms
            .iter()
            .filter_map(|&h| src.room(h))
            .map(|r| u64::from(r.notification_count()))
            .sum();
        self.set_notification_count(count);
    }

    /// A room was invited to, joined or left.
    ///
    /// With `prev` set, `room` supersedes `prev` (e.g. an accepted invite) and takes over its row.
    pub fn update_room<S: RoomSource>(
        &mut self,
        src: &S,
        room: RoomHandle,
        prev: Option<RoomHandle>,
    ) {
        if prev == Some(room) {
            rverror!(?room, "room tried to replace itself");
            self.refresh(room, Fields::All);
            return;
        }
        if let Some(prev) = prev {
            let new_id = src.room(room).map(|r| r.id());
            let prev_id = src.room(prev).map(|r| r.id());
            if new_id != prev_id {
                rverror!(?new_id, ?prev_id, "attempt to replace a room with a different one");
            }
        }

        match self.rooms.iter().position(|&r| r == room || Some(r) == prev) {
            Some(row) => {
                if Some(self.rooms[row]) == prev {
                    if let Some(prev) = prev {
                        self.subscribed.remove(&prev);
                        self.seen_counts.remove(&prev);
                    }
                    self.rooms[row] = room;
                    self.subscribed.insert(room);
                }
                self.seen_counts.insert(room, Self::counts(src, room));
                self.notifier.row_changed(row, Fields::All);
            }
            None => {
                let row = self.rooms.len();
                if !self.notifier.begin(StructuralChange::Insert {
                    first: row,
                    last: row,
                }) {
                    return;
                }
                self.add_room(src, room);
                self.notifier.end(self.rooms.len());
            }
        }
        self.refresh_notification_count(src);
    }

    /// The connection is about to drop `room`. Unknown rooms are already gone.
    pub fn delete_room<S: RoomSource>(&mut self, src: &S, room: RoomHandle) {
        let Some(row) = self.row_of(room) else {
            rvdebug!(?room, "room already deleted");
            return;
        };
        if !self.notifier.begin(StructuralChange::Remove {
            first: row,
            last: row,
        }) {
            return;
        }
        self.rooms.remove(row);
        self.subscribed.remove(&room);
        self.seen_counts.remove(&room);
        self.notifier.end(self.rooms.len());
        self.refresh_notification_count(src);
    }

    /// Direct-chat tags changed for `room_ids`.
    pub fn direct_chats_changed<S: RoomSource>(&mut self, src: &S, room_ids: &[&str]) {
        for id in room_ids {
            if let Some(handle) = src.find_room(id) {
                self.refresh(handle, Fields::All);
            }
        }
    }

    /// Invalidates `fields` of the row showing `room`.
    pub fn refresh(&mut self, room: RoomHandle, fields: Fields<RoomField>) {
        let Some(row) = self.row_of(room) else {
            rverror!(?room, "room not found in the room list");
            return;
        };
        self.notifier.row_changed(row, fields);
    }

    /// Routes a per-room signal. Signals from rooms no longer in the roster are ignored.
    pub fn room_signal<S: RoomSource>(&mut self, src: &S, room: RoomHandle, signal: RoomSignal) {
        if !self.subscribed.contains(&room) {
            rvwarn!(?room, ?signal, "signal from a room the roster is not subscribed to");
            return;
        }
        match signal {
            RoomSignal::AvatarChanged => {
                self.refresh(room, Fields::Only(alloc::vec![RoomField::Avatar]));
            }
            RoomSignal::AddedMessages => {
                self.refresh(room, Fields::Only(alloc::vec![RoomField::LastEvent]));
            }
            RoomSignal::NotificationCountChanged => {
                self.refresh(room, Fields::All);
                self.alert_if_notable(src, room, AlertKind::Message);
                self.refresh_notification_count(src);
            }
            RoomSignal::HighlightCountChanged => {
                self.refresh(room, Fields::All);
                self.alert_if_notable(src, room, AlertKind::Highlight);
            }
            RoomSignal::DisplayNameChanged
            | RoomSignal::UnreadMessagesChanged
            | RoomSignal::TagsChanged
            | RoomSignal::JoinStateChanged => self.refresh(room, Fields::All),
        }
    }

    /// Emits an alert when the counter for `kind` rose since it was last seen.
    fn alert_if_notable<S: RoomSource>(&mut self, src: &S, room: RoomHandle, kind: AlertKind) {
        let Some(r) = src.room(room) else {
            return;
        };
        let seen = self.seen_counts.entry(room).or_default();
        let (count, slot) = match kind {
            AlertKind::Message => (r.notification_count(), &mut seen.0),
            AlertKind::Highlight => (r.highlight_count(), &mut seen.1),
        };
        let previous = core::mem::replace(slot, count);
        if count <= previous {
            return;
        }
        let Some(event) = r.last_event() else {
            return;
        };
        if event.is_state_event() || event.sender_id == r.local_user_id() {
            return;
        }
        let alert = RoomAlert {
            kind,
            room_id: String::from(r.id()),
            event_id: String::from(&event.id),
            room_name: r.display_name(),
            sender_name: r.member_name(&event.sender_id),
            text: r.event_to_string(event),
            avatar: r.avatar(self.options.alert_avatar_size),
        };
        rvtrace!(room = r.id(), event = %event.id, ?kind, "room alert");
        self.emit(RosterEvent::Alert(alert));
    }

    pub fn category<S: RoomSource>(&self, src: &S, row: usize) -> Option<RoomCategory> {
        let room = src.room(self.room_at(row)?)?;
        Some(RoomCategory::of(room))
    }

    pub fn data<S: RoomSource>(&self, src: &S, row: usize, field: RoomField) -> Option<RoomValue> {
        let room = src.room(self.room_at(row)?)?;
        let value = match field {
            RoomField::Name => RoomValue::Text(room.display_name()),
            RoomField::Avatar => RoomValue::Avatar(room.avatar_media_id().map(String::from)),
            RoomField::Topic => RoomValue::Text(String::from(room.topic())),
            RoomField::Category => RoomValue::Category(RoomCategory::of(room)),
            RoomField::UnreadCount => RoomValue::Count(room.unread_count()),
            RoomField::NotificationCount => RoomValue::Count(Some(room.notification_count())),
            RoomField::HighlightCount => RoomValue::Count(Some(room.highlight_count())),
            RoomField::LastEvent => RoomValue::Text(room.last_event_summary()?),
            RoomField::LastActiveTime => RoomValue::Time(room.last_active_time()),
            RoomField::JoinState => RoomValue::Text(String::from(if room.successor_id().is_some() {
                "upgraded"
            } else {
                room.join_state().as_str()
            })),
            RoomField::CategoryVisible => {
                RoomValue::Flag(self.is_category_visible(RoomCategory::of(room)))
            }
        };
        Some(value)
    }
}
