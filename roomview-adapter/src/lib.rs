//! Adapter utilities for the `roomview` crate.
//!
//! The `roomview` crate is UI-agnostic and focuses on row mapping and change notification. This
//! crate provides small, framework-neutral helpers commonly needed by adapters:
//!
//! - Row anchoring (keep the viewport on an event across inserts, backfills and merges)
//! - A sorted/filtered view of the room roster
//! - Desktop alert bookkeeping (notification id to room/event)
//!
//! This crate is intentionally framework-agnostic (no Qt/GTK/egui bindings).
#![forbid(unsafe_code)]

extern crate alloc;

#[macro_use]
mod macros;

mod alerts;
mod anchor;
mod sort_filter;


pub use alerts::{AlertBackend, AlertManager, AlertTarget};
pub use anchor::{RowAnchor, capture_anchor, first_visible_row_for, resolve_anchor};
pub use sort_filter::{RoomSortOrder, SortFilterRoster};
