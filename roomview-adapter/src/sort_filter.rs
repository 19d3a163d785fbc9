use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;

use roomview::{Fields, ModelChange, RoomCategory, RoomField, RoomSource, RoomView, RosterProjection};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoomSortOrder {
    /// By display name, ignoring case.
    Alphabetical,
    /// Most recently active first.
    LastActivity,
    /// By category, then most recently active first.
    #[default]
    Categories,
}

/// A sorted and filtered view over a [`RosterProjection`].
///
/// The view stores roster rows, not rooms: call [`SortFilterRoster::rebuild`] (or feed roster
/// changes to [`SortFilterRoster::apply`]) whenever the roster changes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortFilterRoster {
    order: RoomSortOrder,
    /// Lowercased.
    filter: String,
    rows: Vec<usize>,
}

impl SortFilterRoster {
    pub fn new(order: RoomSortOrder) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }

    pub fn order(&self) -> RoomSortOrder {
        self.order
    }

    /// Returns `true` if the order changed. Takes effect on the next rebuild.
    pub fn set_order(&mut self, order: RoomSortOrder) -> bool {
        let changed = self.order != order;
        self.order = order;
        changed
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Sets the case-insensitive name filter; empty accepts every room. Returns `true` if it
    /// changed. Takes effect on the next rebuild.
    pub fn set_filter(&mut self, text: &str) -> bool {
        let text = text.to_lowercase();
        let changed = self.filter != text;
        self.filter = text;
        changed
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The roster row shown at `row`.
    pub fn source_row(&self, row: usize) -> Option<usize> {
        self.rows.get(row).copied()
    }

    /// Where the roster row `source_row` is shown, if it passes the filter.
    pub fn row_of_source(&self, source_row: usize) -> Option<usize> {
        self.rows.iter().position(|&r| r == source_row)
    }

    fn accepts<R: RoomView + ?Sized>(&self, room: &R) -> bool {
        self.filter.is_empty() || room.display_name().to_lowercase().contains(&self.filter)
    }

    fn compare<R: RoomView + ?Sized>(&self, a: &R, b: &R) -> Ordering {
        match self.order {
            RoomSortOrder::Alphabetical => {
                let (an, bn) = (a.display_name(), b.display_name());
                an.to_lowercase()
                    .cmp(&bn.to_lowercase())
                    .then_with(|| an.cmp(&bn))
            }
            RoomSortOrder::LastActivity => b.last_active_time().cmp(&a.last_active_time()),
            RoomSortOrder::Categories => RoomCategory::of(a)
                .cmp(&RoomCategory::of(b))
                .then_with(|| b.last_active_time().cmp(&a.last_active_time())),
        }
    }

    /// Recomputes the view from the roster. Ties keep roster order.
    pub fn rebuild<S: RoomSource>(&mut self, roster: &RosterProjection, src: &S) {
        let mut rows: Vec<(usize, &S::Room)> = (0..roster.row_count())
            .filter_map(|row| Some((row, src.room(roster.room_at(row)?)?)))
            .filter(|(_, room)| self.accepts(*room))
            .collect();
        rows.sort_by(|(_, a), (_, b)| self.compare(*a, *b));
        self.rows = rows.into_iter().map(|(row, _)| row).collect();
        adebug!(
            order = ?self.order,
            filter = %self.filter,
            rows = self.rows.len(),
            "roster view rebuilt"
        );
    }

    /// Rebuilds if `change` can affect membership or order of the view. Returns `true` if it did.
    pub fn apply<S: RoomSource>(
        &mut self,
        change: &ModelChange<RoomField>,
        roster: &RosterProjection,
        src: &S,
    ) -> bool {
        let affected = match change {
            ModelChange::AboutTo(_) => false,
            ModelChange::Done { .. } => true,
            ModelChange::ContentChanged { fields, .. } => match fields {
                Fields::All => true,
                Fields::Only(_) => [RoomField::Name, RoomField::Category, RoomField::LastActiveTime]
                    .iter()
                    .any(|f| fields.contains(f)),
            },
        };
        if affected {
            self.rebuild(roster, src);
        }
        affected
    }
}
