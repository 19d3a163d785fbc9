//! Index-stable incremental list projections for a chat client.
//!
//! For adapter-level utilities (row anchors, a sorted/filtered roster, alert bookkeeping), see
//! the `roomview-adapter` crate.
//!
//! Two projections map externally owned, externally mutated collections onto flat row spaces:
//! - [`TimelineProjection`]: pending (local echo) + committed events, row 0 = most recent.
//! - [`RosterProjection`]: the connection's rooms, with categories and an aggregate
//!   notification count.
//!
//! Both are UI-agnostic. Sources report every mutation in two phases ("about to", then
//! "done"); the projections translate that into precise [`ModelChange`]s so a consumer holding
//! cached row mappings never observes a row count that disagrees with the source. Per-row
//! presentation facts (visibility, grouping, "row above" lookups, timestamps) are computed on
//! demand by the [`evaluator`] from a bounded neighbourhood.
#![forbid(unsafe_code)]

extern crate alloc;

#[macro_use]
mod macros;

pub mod evaluator;
mod event;
pub mod memory;
mod notify;
mod options;
pub mod render;
mod roster;
mod rows;
mod source;
mod timeline;

#[cfg(test)]
mod tests;

pub use evaluator::{EventStatus, EventTypeTag, RowEvent};
pub use event::{
    DeliveryStatus, Event, FileInfo, FileTransferInfo, MemberChange, MemberState, Membership,
    MessageContent, MessageKind, Payload, PendingEvent, RedactionInfo, TransferStatus,
};
pub use notify::{
    ChangeListener, ChangeNotifier, ChangeRecorder, Fields, ModelChange, StructuralChange,
    SubscriptionId,
};
pub use options::{
    Clock, DEFAULT_ALERT_AVATAR_SIZE, DEFAULT_SCAN_WINDOW, RosterOptions, TimelineOptions,
};
pub use render::TextContext;
pub use roster::{
    AlertKind, RoomAlert, RoomCategory, RoomField, RoomSignal, RoomValue, RosterEvent,
    RosterEventListener, RosterProjection,
};
pub use rows::{RowSpace, Segment};
pub use source::{EventSource, JoinState, RoomHandle, RoomSource, RoomView, TimelineIndex};
pub use timeline::{TimelineField, TimelineProjection, TimelineValue};
