use alloc::string::String;
use alloc::vec::Vec;

use chrono::{DateTime, Utc};

use crate::event::{Event, FileTransferInfo, PendingEvent};
use crate::render::{self, TextContext};

/// Chronological position in a timeline; grows towards newer events and may go negative for
/// backfilled history.
pub type TimelineIndex = i64;

/// The externally owned timeline a [`crate::TimelineProjection`] projects.
///
/// The projection never holds on to returned references past the current call: the source is free
/// to mutate between notifications.
pub trait EventSource: TextContext {
    fn room_id(&self) -> &str;

    fn local_user_id(&self) -> &str;

    fn pending_count(&self) -> usize;

    fn timeline_size(&self) -> usize;

    /// Pending event at `offset`, oldest first.
    fn pending_event(&self, offset: usize) -> Option<&PendingEvent>;

    /// Committed event at reverse-chronological `offset` (0 = newest).
    fn timeline_event(&self, offset: usize) -> Option<&Event>;

    /// Reverse-chronological offset of a committed event.
    fn find_in_timeline(&self, event_id: &str) -> Option<usize>;

    /// Chronological index of the newest committed event.
    fn max_timeline_index(&self) -> TimelineIndex;

    /// The local user's read marker.
    fn read_marker_event_id(&self) -> Option<&str>;

    /// Users whose read marker sits on `event_id`, the local user included.
    fn users_at_event(&self, _event_id: &str) -> Vec<String> {
        Vec::new()
    }

    fn is_event_highlighted(&self, _event: &Event) -> bool {
        false
    }

    fn file_transfer(&self, _event_id: &str) -> Option<FileTransferInfo> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoomHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JoinState {
    Invite,
    Join,
    Leave,
}

impl JoinState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invite => "invite",
            Self::Join => "join",
            Self::Leave => "leave",
        }
    }
}

/// A room object owned by the connection.
///
/// Two distinct objects (handles) may represent the same logical room id, e.g. the invite and
/// the joined room after accepting it.
pub trait RoomView: TextContext {
    fn id(&self) -> &str;

    fn display_name(&self) -> String;

    fn avatar_media_id(&self) -> Option<&str>;

    fn topic(&self) -> &str;

    fn join_state(&self) -> JoinState;

    /// Set once the room has been upgraded.
    fn successor_id(&self) -> Option<&str>;

    fn is_favourite(&self) -> bool;

    fn is_direct_chat(&self) -> bool;

    fn is_low_priority(&self) -> bool;

    /// `None` when unknown.
    fn unread_count(&self) -> Option<u32>;

    fn notification_count(&self) -> u32;

    fn highlight_count(&self) -> u32;

    fn last_active_time(&self) -> Option<DateTime<Utc>>;

    /// The newest committed event, if any.
    fn last_event(&self) -> Option<&Event>;

    fn local_user_id(&self) -> &str;

    /// An opaque avatar handle of roughly `size` pixels.
    fn avatar(&self, _size: u32) -> Option<String> {
        self.avatar_media_id().map(String::from)
    }

    /// A one-line rendering of `event`.
    fn event_to_string(&self, event: &Event) -> String {
        render::display_text(event, self)
    }

    /// One-line summary of the newest event, prefixed with its author.
    fn last_event_summary(&self) -> Option<String> {
        let event = self.last_event()?;
        let mut out = self.member_name(&event.sender_id);
        out.push_str(": ");
        out.push_str(&self.event_to_string(event));
        Some(out)
    }
}

/// The externally owned room collection a [`crate::RosterProjection`] projects.
pub trait RoomSource {
    type Room: RoomView;

    fn room(&self, handle: RoomHandle) -> Option<&Self::Room>;

    /// All rooms, in connection order.
    fn all_rooms(&self) -> Vec<RoomHandle>;

    fn find_room(&self, room_id: &str) -> Option<RoomHandle>;
}
