//! Per-row derived facts.
//!
//! Everything here is a pure function of the source state and a bounded neighbourhood of the
//! anchor row: nothing is cached, so answers are always consistent with the latest notification.

use alloc::string::String;
use alloc::vec::Vec;

use chrono::{DateTime, Local, NaiveDate, TimeZone};

use crate::event::{DeliveryStatus, Event, MessageKind, Payload, PendingEvent};
use crate::rows::{RowSpace, Segment};
use crate::source::EventSource;

/// Visibility of a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventStatus {
    Normal,
    Hidden,
    Redacted,
    Pending(DeliveryStatus),
}

/// Coarse type of a row, for picking a delegate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventTypeTag {
    Emote,
    Notice,
    Image,
    Audio,
    File,
    Message,
    State,
    Other,
}

impl EventTypeTag {
    pub fn of(event: &Event) -> Self {
        if let Payload::Message(content) = &event.payload {
            return match content.kind {
                MessageKind::Emote => Self::Emote,
                MessageKind::Notice => Self::Notice,
                MessageKind::Image => Self::Image,
                MessageKind::Audio => Self::Audio,
                _ if content.has_file_content() => Self::File,
                _ => Self::Message,
            };
        }
        if event.is_state_event() {
            Self::State
        } else {
            Self::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emote => "emote",
            Self::Notice => "notice",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::File => "file",
            Self::Message => "message",
            Self::State => "state",
            Self::Other => "other",
        }
    }
}

/// The event behind a row.
#[derive(Clone, Copy, Debug)]
pub enum RowEvent<'a> {
    Pending(&'a PendingEvent),
    /// `offset` is reverse-chronological (0 = newest committed event).
    Committed { event: &'a Event, offset: usize },
}

impl<'a> RowEvent<'a> {
    pub fn event(&self) -> &'a Event {
        match *self {
            Self::Pending(p) => &p.event,
            Self::Committed { event, .. } => event,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

pub fn row_space<S: EventSource + ?Sized>(src: &S) -> RowSpace {
    RowSpace::new(src.pending_count(), src.timeline_size())
}

pub fn resolve_row<S: EventSource + ?Sized>(src: &S, row: usize) -> Option<RowEvent<'_>> {
    match row_space(src).from_row(row)? {
        (Segment::Pending, offset) => src.pending_event(offset).map(RowEvent::Pending),
        (Segment::Committed, offset) => src
            .timeline_event(offset)
            .map(|event| RowEvent::Committed { event, offset }),
    }
}

/// MIME type a delegate should render the row's text with.
pub fn content_type(event: &Event) -> &str {
    match event.as_message() {
        Some(m) if m.mime_type == "text/plain" => "text/html",
        Some(m) => &m.mime_type,
        None => "text/plain",
    }
}

pub fn status<S: EventSource + ?Sized>(src: &S, row: RowEvent<'_>, window: usize) -> EventStatus {
    let (evt, offset) = match row {
        RowEvent::Pending(p) => return EventStatus::Pending(p.status),
        RowEvent::Committed { event, offset } => (event, offset),
    };

    if matches!(evt.payload, Payload::Redaction { .. }) {
        return EventStatus::Hidden;
    }
    let member = evt.as_member();
    if member.is_some_and(|m| m.is_join() || m.is_leave()) {
        return EventStatus::Hidden;
    }
    if (member.is_some() || evt.is_redacted())
        && evt.sender_id == src.local_user_id()
        && !is_user_activity_notable(src, offset, window)
    {
        return EventStatus::Hidden;
    }
    if evt.is_redacted() {
        return EventStatus::Redacted;
    }
    if evt.is_state_event() && evt.repeats_state {
        return EventStatus::Hidden;
    }
    EventStatus::Normal
}

enum Scan {
    Notable,
    Bracket,
    Nothing,
}

/// Whether the anchor's sender did anything besides joining, leaving and being redacted within
/// `window` rows of the committed event at `offset`.
///
/// Walks to older events until a join and to newer events until a leave/ban; any other
/// non-redacted event by the same sender makes the activity notable. Without a clean
/// join/leave bracket the activity is assumed notable.
pub fn is_user_activity_notable<S: EventSource + ?Sized>(
    src: &S,
    offset: usize,
    window: usize,
) -> bool {
    let Some(anchor) = src.timeline_event(offset) else {
        return true;
    };
    let sender = anchor.sender_id.as_str();
    let mut redactions_found = false;

    let mut scan = |offsets: &mut dyn Iterator<Item = usize>, closes: fn(&Event) -> bool| {
        for o in offsets {
            let Some(e) = src.timeline_event(o) else {
                break;
            };
            if e.sender_id != sender {
                continue;
            }
            if e.is_redacted() {
                redactions_found = true;
                continue;
            }
            if e.as_member().is_none() {
                return Scan::Notable;
            }
            if closes(e) {
                return Scan::Bracket;
            }
        }
        Scan::Nothing
    };

    let size = src.timeline_size();
    let older_end = size.min(offset.saturating_add(window));
    let join = match scan(&mut (offset..older_end), |e| {
        e.as_member().is_some_and(|m| m.is_join())
    }) {
        Scan::Notable => return true,
        Scan::Bracket => true,
        Scan::Nothing => false,
    };
    let leave = match scan(&mut (offset.saturating_sub(window)..=offset).rev(), |e| {
        e.as_member().is_some_and(|m| {
            m.is_leave() || m.membership == Some(crate::event::Membership::Ban)
        })
    }) {
        Scan::Notable => return true,
        Scan::Bracket => true,
        Scan::Nothing => false,
    };

    if redactions_found {
        return false;
    }
    !(join && leave)
}

fn midnight(date: NaiveDate) -> Option<DateTime<Local>> {
    Local
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()
}

/// Timestamp of the committed event at `offset`.
///
/// Events without a valid timestamp borrow the date of the nearest valid one (older events
/// first, then newer), at local midnight.
pub fn committed_timestamp<S: EventSource + ?Sized>(
    src: &S,
    offset: usize,
) -> Option<DateTime<Local>> {
    let valid = |o: usize| src.timeline_event(o).and_then(|e| e.timestamp);
    if let Some(ts) = valid(offset) {
        return Some(ts.with_timezone(&Local));
    }

    let size = src.timeline_size();
    let nearest = (offset..size)
        .find_map(valid)
        .or_else(|| (0..offset.min(size)).rev().find_map(valid));
    match nearest {
        Some(ts) => midnight(ts.with_timezone(&Local).date_naive()),
        None => {
            rverror!(room = src.room_id(), "no valid timestamps in the room timeline");
            None
        }
    }
}

pub fn row_time<S: EventSource + ?Sized>(src: &S, row: RowEvent<'_>) -> Option<DateTime<Local>> {
    match row {
        RowEvent::Pending(p) => Some(p.last_updated.with_timezone(&Local)),
        RowEvent::Committed { offset, .. } => committed_timestamp(src, offset),
    }
}

/// Section header for a timestamp, relative to `now`.
///
/// Dates within the last week are named by weekday (`%A`). Older dates use chrono's `%x`, which
/// is always `mm/dd/yy` and does not follow the system locale.
pub fn section_label(timestamp: Option<DateTime<Local>>, now: DateTime<Local>) -> String {
    let Some(ts) = timestamp else {
        return String::new();
    };
    let date = ts.date_naive();
    let today = now.date_naive();
    match today.signed_duration_since(date).num_days() {
        0 => String::from("Today"),
        1 => String::from("Yesterday"),
        2 => String::from("The day before yesterday"),
        days if days < 7 => date.format("%A").to_string(),
        _ => date.format("%x").to_string(),
    }
}

/// The nearest row above `row` (towards older events) that is not hidden.
pub fn row_above<S: EventSource + ?Sized>(src: &S, row: usize, window: usize) -> Option<usize> {
    let count = row_space(src).len();
    (row.saturating_add(1)..count).find(|&r| {
        resolve_row(src, r).is_some_and(|e| status(src, e, window) != EventStatus::Hidden)
    })
}

/// Other users whose read marker sits on `event`.
pub fn user_markers<S: EventSource + ?Sized>(src: &S, event: &Event) -> Vec<String> {
    if event.id.is_empty() {
        return Vec::new();
    }
    let local = src.local_user_id();
    src.users_at_event(&event.id)
        .into_iter()
        .filter(|u| u != local)
        .collect()
}
