use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;
use core::mem;

use chrono::{DateTime, Local};

use crate::evaluator::{self, EventStatus, EventTypeTag, RowEvent};
use crate::event::{FileInfo, FileTransferInfo};
use crate::notify::{ChangeNotifier, Fields, ModelChange, StructuralChange, SubscriptionId};
use crate::options::TimelineOptions;
use crate::render;
use crate::rows::{RowSpace, Segment};
use crate::source::{EventSource, TimelineIndex};

/// Fields a consumer can query per timeline row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimelineField {
    Display,
    Message,
    EventId,
    EventType,
    ResolvedType,
    Author,
    ContentType,
    Content,
    Highlight,
    ReadMarker,
    UserMarkers,
    Status,
    Progress,
    Annotation,
    Time,
    Section,
    AboveEventType,
    AboveAuthor,
    AboveSection,
    AboveTime,
}

impl TimelineField {
    /// Fields that depend on the nearest visible row above.
    pub const ABOVE: [TimelineField; 4] = [
        TimelineField::AboveEventType,
        TimelineField::AboveAuthor,
        TimelineField::AboveSection,
        TimelineField::AboveTime,
    ];

    /// The row field an "above" field mirrors.
    pub fn above_source(self) -> Option<TimelineField> {
        match self {
            Self::AboveEventType => Some(Self::EventType),
            Self::AboveAuthor => Some(Self::Author),
            Self::AboveSection => Some(Self::Section),
            Self::AboveTime => Some(Self::Time),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimelineValue {
    Text(String),
    Flag(bool),
    Type(EventTypeTag),
    Status(EventStatus),
    Time(Option<DateTime<Local>>),
    Users(Vec<String>),
    Progress(FileTransferInfo),
    File(FileInfo),
}

/// Projects a pending + committed event source onto one row space, row 0 being the most recent.
///
/// The projection holds no events. The source is passed to every call and must be the one the
/// projection was attached to; mutations are reported through the two-phase notification
/// methods (`*_about_to_*` before the source applies a mutation, the matching completion after).
#[derive(Debug, Default)]
pub struct TimelineProjection {
    options: TimelineOptions,
    room_id: Option<String>,
    source_addr: usize,
    last_read_event_id: Option<String>,
    row_below_inserted: Option<usize>,
    moving_event: bool,
    notifier: ChangeNotifier<TimelineField>,
}

impl TimelineProjection {
    pub fn new(options: TimelineOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &TimelineOptions {
        &self.options
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&ModelChange<TimelineField>) + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn last_read_event_id(&self) -> Option<&str> {
        self.last_read_event_id.as_deref()
    }

    fn is_attached_to<S: EventSource + ?Sized>(&self, src: &S) -> bool {
        let attached = self.room_id.as_deref() == Some(src.room_id());
        if !attached {
            rvwarn!(
                room = src.room_id(),
                current = ?self.room_id,
                "notification from a source the timeline is not attached to"
            );
        }
        attached
    }

    /// Attaches to `src` (or detaches with `None`), announcing a reset.
    ///
    /// Re-attaching the same source object is a no-op. A different object for the same room
    /// (e.g. after a reconnect) is a fresh attach.
    pub fn set_source<S: EventSource + ?Sized>(&mut self, src: Option<&S>) {
        let addr = src.map_or(0, |s| core::ptr::from_ref(s).cast::<()>() as usize);
        if self.room_id.as_deref() == src.map(|s| s.room_id()) && self.source_addr == addr {
            return;
        }
        if !self.notifier.begin(StructuralChange::Reset) {
            return;
        }
        self.row_below_inserted = None;
        self.moving_event = false;
        self.source_addr = addr;
        match src {
            Some(src) => {
                rvdebug!(
                    room = src.room_id(),
                    user = src.local_user_id(),
                    "timeline attached"
                );
                self.room_id = Some(String::from(src.room_id()));
                self.last_read_event_id = src.read_marker_event_id().map(String::from);
            }
            None => {
                rvdebug!(room = ?self.room_id, "timeline detached");
                self.room_id = None;
                self.last_read_event_id = None;
            }
        }
        let rows = src.map_or(0, |s| self.row_count(s));
        self.notifier.end(rows);
    }

    pub fn row_space<S: EventSource + ?Sized>(&self, src: &S) -> RowSpace {
        if self.room_id.as_deref() != Some(src.room_id()) {
            return RowSpace::default();
        }
        evaluator::row_space(src)
    }

    pub fn row_count<S: EventSource + ?Sized>(&self, src: &S) -> usize {
        self.row_space(src).len()
    }

    /// The event behind `row`, or `None` outside `[0, row_count)`.
    pub fn row<'s, S: EventSource + ?Sized>(&self, src: &'s S, row: usize) -> Option<RowEvent<'s>> {
        if !self.row_space(src).contains(row) {
            return None;
        }
        evaluator::resolve_row(src, row)
    }

    /// Row holding the committed event `event_id`.
    pub fn find_row<S: EventSource + ?Sized>(&self, src: &S, event_id: &str) -> Option<usize> {
        let offset = src.find_in_timeline(event_id)?;
        self.row_space(src).to_row(Segment::Committed, offset)
    }

    pub fn status<S: EventSource + ?Sized>(&self, src: &S, row: usize) -> Option<EventStatus> {
        let e = self.row(src, row)?;
        Some(evaluator::status(src, e, self.options.scan_window))
    }

    /// The nearest non-hidden row above `row`.
    pub fn row_above<S: EventSource + ?Sized>(&self, src: &S, row: usize) -> Option<usize> {
        if !self.row_space(src).contains(row) {
            return None;
        }
        evaluator::row_above(src, row, self.options.scan_window)
    }

    pub fn data<S: EventSource + ?Sized>(
        &self,
        src: &S,
        row: usize,
        field: TimelineField,
    ) -> Option<TimelineValue> {
        let e = self.row(src, row)?;
        let evt = e.event();
        let pending = match e {
            RowEvent::Pending(p) => Some(p),
            RowEvent::Committed { .. } => None,
        };

        let value = match field {
            TimelineField::Display => TimelineValue::Text(render::display_text(evt, src)),
            TimelineField::Message => TimelineValue::Text(render::message_body(evt)),
            TimelineField::EventId => TimelineValue::Text(String::from(evt.display_id())),
            TimelineField::EventType => TimelineValue::Type(EventTypeTag::of(evt)),
            TimelineField::ResolvedType => {
                TimelineValue::Text(String::from(evt.payload.event_type()))
            }
            TimelineField::Author => TimelineValue::Text(String::from(if pending.is_some() {
                src.local_user_id()
            } else {
                evt.sender_id.as_str()
            })),
            TimelineField::ContentType => {
                TimelineValue::Text(String::from(evaluator::content_type(evt)))
            }
            TimelineField::Content => {
                if let Some(text) = render::redacted_text(evt) {
                    TimelineValue::Text(text)
                } else {
                    TimelineValue::File(evt.as_message()?.file.clone()?)
                }
            }
            TimelineField::Highlight => TimelineValue::Flag(src.is_event_highlighted(evt)),
            TimelineField::ReadMarker => TimelineValue::Flag(
                !evt.id.is_empty() && self.last_read_event_id.as_deref() == Some(&evt.id),
            ),
            TimelineField::UserMarkers => TimelineValue::Users(evaluator::user_markers(src, evt)),
            TimelineField::Status => {
                TimelineValue::Status(evaluator::status(src, e, self.options.scan_window))
            }
            TimelineField::Progress => {
                if !evt.as_message()?.has_file_content() {
                    return None;
                }
                TimelineValue::Progress(src.file_transfer(&evt.id)?)
            }
            TimelineField::Annotation => TimelineValue::Text(pending?.annotation.clone()),
            TimelineField::Time => TimelineValue::Time(evaluator::row_time(src, e)),
            TimelineField::Section => TimelineValue::Text(evaluator::section_label(
                evaluator::row_time(src, e),
                self.options.now(),
            )),
            TimelineField::AboveEventType
            | TimelineField::AboveAuthor
            | TimelineField::AboveSection
            | TimelineField::AboveTime => {
                let above = evaluator::row_above(src, row, self.options.scan_window)?;
                return self.data(src, above, field.above_source()?);
            }
        };
        Some(value)
    }

    /// Invalidates `fields` of `row`.
    pub fn refresh_row(&mut self, row: usize, fields: Fields<TimelineField>) {
        self.notifier.row_changed(row, fields);
    }

    /// Invalidates `fields` of the row holding `event_id`; returns that row.
    ///
    /// A miss is logged and otherwise ignored: the source may have pruned the event.
    pub fn refresh_event<S: EventSource + ?Sized>(
        &mut self,
        src: &S,
        event_id: &str,
        fields: Fields<TimelineField>,
    ) -> Option<usize> {
        let Some(row) = self.find_row(src, event_id) else {
            rvwarn!(event_id, "trying to refresh an inexistent event");
            return None;
        };
        self.refresh_row(row, fields);
        Some(row)
    }

    fn same_sender_rows<S: EventSource + ?Sized>(
        &self,
        src: &S,
        offset: usize,
        rows: &mut BTreeSet<usize>,
    ) {
        let space = self.row_space(src);
        let Some(anchor) = src.timeline_event(offset) else {
            return;
        };
        let window = self.options.scan_window;
        let lo = offset.saturating_sub(window);
        let hi = offset.saturating_add(window).min(space.committed);
        for o in lo..hi {
            if src
                .timeline_event(o)
                .is_some_and(|e| e.sender_id == anchor.sender_id)
            {
                rows.insert(space.committed_row(o));
            }
        }
    }

    /// Invalidates every row within the scan window of `row` that shares its sender.
    pub fn refresh_nearby_same_sender<S: EventSource + ?Sized>(&mut self, src: &S, row: usize) {
        let Some((Segment::Committed, offset)) = self.row_space(src).from_row(row) else {
            return;
        };
        let mut rows = BTreeSet::new();
        self.same_sender_rows(src, offset, &mut rows);
        for r in rows {
            self.refresh_row(r, Fields::All);
        }
    }

    pub fn new_messages_about_to_add<S: EventSource + ?Sized>(&mut self, src: &S, count: usize) {
        if count == 0 || !self.is_attached_to(src) {
            return;
        }
        let base = self.row_space(src).base();
        self.notifier.begin(StructuralChange::Insert {
            first: base,
            last: base + count - 1,
        });
    }

    pub fn historical_messages_about_to_add<S: EventSource + ?Sized>(
        &mut self,
        src: &S,
        count: usize,
    ) {
        if count == 0 || !self.is_attached_to(src) {
            return;
        }
        let rows = self.row_count(src);
        self.row_below_inserted = rows.checked_sub(1);
        self.notifier.begin(StructuralChange::Insert {
            first: rows,
            last: rows + count - 1,
        });
    }

    /// Completes either kind of message insertion. `lowest..=biggest` are the chronological
    /// indices of the added events.
    pub fn messages_added<S: EventSource + ?Sized>(
        &mut self,
        src: &S,
        lowest: TimelineIndex,
        biggest: TimelineIndex,
    ) {
        if !self.is_attached_to(src) {
            return;
        }
        if matches!(self.notifier.in_flight(), Some(StructuralChange::Insert { .. })) {
            let rows = self.row_count(src);
            self.notifier.end(rows);
        }

        let space = self.row_space(src);
        let max = src.max_timeline_index();
        let mut above = BTreeSet::new();
        above.extend(self.row_below_inserted.take());
        if biggest < max {
            let below = usize::try_from(max - biggest - 1).ok();
            above.extend(below.and_then(|o| space.to_row(Segment::Committed, o)));
        } else if space.base() > 0 {
            // The oldest pending row now sits on top of the new newest event.
            above.insert(space.base() - 1);
        }
        for row in above {
            self.refresh_row(row, Fields::from(&TimelineField::ABOVE[..]));
        }

        let newest = usize::try_from(max - biggest).unwrap_or(0);
        let oldest = usize::try_from(max - lowest).unwrap_or(0);
        let mut rows = BTreeSet::new();
        for offset in newest..=oldest.min(space.committed.saturating_sub(1)) {
            self.same_sender_rows(src, offset, &mut rows);
        }
        for row in rows {
            self.refresh_row(row, Fields::All);
        }
    }

    pub fn pending_event_about_to_add<S: EventSource + ?Sized>(&mut self, src: &S) {
        if self.is_attached_to(src) {
            self.notifier
                .begin(StructuralChange::Insert { first: 0, last: 0 });
        }
    }

    pub fn pending_event_added<S: EventSource + ?Sized>(&mut self, src: &S) {
        if self.is_attached_to(src) {
            let rows = self.row_count(src);
            self.notifier.end(rows);
        }
    }

    /// The pending event at oldest-first `offset` is about to join the committed timeline.
    ///
    /// Offset 0 merges in place. Any other offset means the event overtook older pending events,
    /// so its row moves to the committed boundary.
    pub fn pending_event_about_to_merge<S: EventSource + ?Sized>(&mut self, src: &S, offset: usize) {
        if offset == 0 || !self.is_attached_to(src) {
            return;
        }
        let space = self.row_space(src);
        let Some(row) = space.to_row(Segment::Pending, offset) else {
            rvwarn!(offset, pending = space.pending, "merge offset outside the pending events");
            debug_assert!(offset < space.pending, "merge offset {offset} out of range");
            return;
        };
        self.moving_event = self.notifier.begin(StructuralChange::Move {
            first: row,
            last: row,
            destination: space.base(),
        });
    }

    pub fn pending_event_merged<S: EventSource + ?Sized>(&mut self, src: &S) {
        if !self.is_attached_to(src) {
            return;
        }
        if mem::take(&mut self.moving_event) {
            let rows = self.row_count(src);
            self.notifier.end(rows);
        }
        let space = self.row_space(src);
        let base = space.base();
        if space.contains(base) {
            self.refresh_row(base, Fields::All);
        }
        self.refresh_nearby_same_sender(src, base);
        if space.committed > 1 {
            self.refresh_row(base + 1, Fields::Only(alloc::vec![TimelineField::ReadMarker]));
        }
        if base > 0 {
            self.refresh_row(base - 1, Fields::from(&TimelineField::ABOVE[..]));
        }
    }

    pub fn pending_event_changed<S: EventSource + ?Sized>(&mut self, src: &S, row: usize) {
        if self.is_attached_to(src) {
            self.refresh_row(row, Fields::All);
        }
    }

    pub fn pending_event_about_to_discard<S: EventSource + ?Sized>(&mut self, src: &S, row: usize) {
        if self.is_attached_to(src) {
            self.notifier
                .begin(StructuralChange::Remove { first: row, last: row });
        }
    }

    pub fn pending_event_discarded<S: EventSource + ?Sized>(&mut self, src: &S) {
        if !self.is_attached_to(src) {
            return;
        }
        let removed = self.notifier.in_flight();
        let rows = self.row_count(src);
        self.notifier.end(rows);
        if let Some(StructuralChange::Remove { first, .. }) = removed {
            if first > 0 && first - 1 < rows {
                self.refresh_row(first - 1, Fields::from(&TimelineField::ABOVE[..]));
            }
        }
    }

    /// The local user's read marker moved; refreshes the rows it left and reached.
    pub fn read_marker_moved<S: EventSource + ?Sized>(&mut self, src: &S) {
        if !self.is_attached_to(src) {
            return;
        }
        let next = src.read_marker_event_id().map(String::from);
        let prev = mem::replace(&mut self.last_read_event_id, next.clone());
        let fields = || Fields::Only(alloc::vec![TimelineField::ReadMarker]);
        if let Some(prev) = prev {
            self.refresh_event(src, &prev, fields());
        }
        if let Some(next) = next {
            self.refresh_event(src, &next, fields());
        }
    }

    pub fn read_marker_for_user_moved<S: EventSource + ?Sized>(
        &mut self,
        src: &S,
        user_id: &str,
        from_event_id: &str,
        to_event_id: &str,
    ) {
        if !self.is_attached_to(src) {
            return;
        }
        rvtrace!(user_id, from_event_id, to_event_id, "user read marker moved");
        let fields = || Fields::Only(alloc::vec![TimelineField::UserMarkers]);
        self.refresh_event(src, from_event_id, fields());
        self.refresh_event(src, to_event_id, fields());
    }

    /// An event was replaced in place (e.g. a local echo by its server copy).
    pub fn replaced_event<S: EventSource + ?Sized>(&mut self, src: &S, event_id: &str) {
        if !self.is_attached_to(src) {
            return;
        }
        if let Some(row) = self.refresh_event(src, event_id, Fields::All) {
            self.refresh_nearby_same_sender(src, row);
        }
    }

    /// File transfer progress, completion, failure or cancellation for `event_id`.
    pub fn file_transfer_changed<S: EventSource + ?Sized>(&mut self, src: &S, event_id: &str) {
        if self.is_attached_to(src) {
            self.refresh_event(src, event_id, Fields::All);
        }
    }
}
