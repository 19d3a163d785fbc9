use alloc::string::String;

use roomview::{EventSource, Segment, TimelineProjection};

/// An event identity that can be used to find "the same row" again after structural changes.
///
/// Typical use cases:
/// - keeping the viewport on a message while history is backfilled below it
/// - following a local echo as it is merged into the committed timeline (its row may move)
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowAnchor {
    /// Committed event id; empty while the event is pending.
    pub event_id: String,
    pub transaction_id: String,
    /// Rows between the anchored row and the first visible row.
    pub offset_in_viewport: usize,
}

/// Captures an anchor for `row`, relative to the first visible row.
///
/// Returns `None` if `row` is outside the projection's row space.
pub fn capture_anchor<S: EventSource + ?Sized>(
    proj: &TimelineProjection,
    src: &S,
    row: usize,
    first_visible_row: usize,
) -> Option<RowAnchor> {
    let event = proj.row(src, row)?.event();
    Some(RowAnchor {
        event_id: event.id.clone(),
        transaction_id: event.transaction_id.clone(),
        offset_in_viewport: row.saturating_sub(first_visible_row),
    })
}

/// The row currently holding the anchored event.
///
/// Committed events are found by id. Pending events are found by transaction id; once merged,
/// they are looked up by transaction id among the newest committed rows (within the projection's
/// scan window).
pub fn resolve_anchor<S: EventSource + ?Sized>(
    proj: &TimelineProjection,
    src: &S,
    anchor: &RowAnchor,
) -> Option<usize> {
    if !anchor.event_id.is_empty() {
        if let Some(row) = proj.find_row(src, &anchor.event_id) {
            return Some(row);
        }
    }
    if anchor.transaction_id.is_empty() {
        return None;
    }
    let space = proj.row_space(src);
    let by_txn = |row: usize| {
        proj.row(src, row)
            .is_some_and(|e| e.event().transaction_id == anchor.transaction_id)
    };
    if let Some(row) = (0..space.base()).find(|&r| by_txn(r)) {
        return Some(row);
    }
    let window = proj.options().scan_window.min(space.committed);
    (0..window)
        .filter_map(|offset| space.to_row(Segment::Committed, offset))
        .find(|&r| by_txn(r))
}

/// The first visible row that keeps `anchor` at its captured distance from the viewport top.
///
/// Returns `None` when the anchored event is gone.
pub fn first_visible_row_for<S: EventSource + ?Sized>(
    proj: &TimelineProjection,
    src: &S,
    anchor: &RowAnchor,
) -> Option<usize> {
    let row = resolve_anchor(proj, src, anchor)?;
    Some(row.saturating_sub(anchor.offset_in_viewport))
}
