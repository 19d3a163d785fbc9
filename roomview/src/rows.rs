/// One of the two source segments backing the timeline row space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Segment {
    /// Locally originated events, addressed oldest-first.
    Pending,
    /// Source-ordered events, addressed newest-first.
    Committed,
}

/// The unified row space over `pending` + `committed` events.
///
/// Rows `[0, pending)` are pending events, most recently added first; rows
/// `[pending, pending + committed)` are committed events, newest first.
///
/// Pending offsets are oldest-first (offset `0` is the pending event closest to the committed
/// timeline, i.e. row `pending - 1`). Committed offsets are reverse-chronological (offset `0` is
/// the newest committed event, i.e. row `pending`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowSpace {
    pub pending: usize,
    pub committed: usize,
}

impl RowSpace {
    pub fn new(pending: usize, committed: usize) -> Self {
        Self { pending, committed }
    }

    pub fn len(&self) -> usize {
        self.pending.saturating_add(self.committed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first committed row; equal to the pending count.
    pub fn base(&self) -> usize {
        self.pending
    }

    pub fn contains(&self, row: usize) -> bool {
        row < self.len()
    }

    /// Maps a segment offset to a row. Returns `None` if the offset is outside the segment.
    pub fn to_row(&self, segment: Segment, offset: usize) -> Option<usize> {
        match segment {
            Segment::Pending => (offset < self.pending).then(|| self.pending - 1 - offset),
            Segment::Committed => (offset < self.committed).then(|| self.pending + offset),
        }
    }

    /// Maps a row back to its segment offset. Returns `None` for rows outside the row space.
    pub fn from_row(&self, row: usize) -> Option<(Segment, usize)> {
        if row < self.pending {
            Some((Segment::Pending, self.pending - 1 - row))
        } else if row < self.len() {
            Some((Segment::Committed, row - self.pending))
        } else {
            None
        }
    }

    /// Row of the committed event at reverse-chronological `offset`, without a bounds check.
    pub(crate) fn committed_row(&self, offset: usize) -> usize {
        self.pending + offset
    }
}
