use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

/// A structural mutation of a row space.
///
/// Ranges are inclusive. For [`StructuralChange::Move`], `destination` is expressed in
/// pre-move coordinates: the moved block ends up in front of the row that was at `destination`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StructuralChange {
    Insert {
        first: usize,
        last: usize,
    },
    Remove {
        first: usize,
        last: usize,
    },
    Move {
        first: usize,
        last: usize,
        destination: usize,
    },
    /// Everything may have changed; consumers must re-query the row count.
    Reset,
}

impl StructuralChange {
    fn span(first: usize, last: usize) -> usize {
        last.saturating_sub(first).saturating_add(1)
    }

    /// Row count after applying this change to a row space of `before` rows.
    ///
    /// Returns `None` for [`StructuralChange::Reset`], where the new count is only known from the
    /// source.
    pub fn apply_to(&self, before: usize) -> Option<usize> {
        match *self {
            Self::Insert { first, last } => Some(before.saturating_add(Self::span(first, last))),
            Self::Remove { first, last } => Some(before.saturating_sub(Self::span(first, last))),
            Self::Move { .. } => Some(before),
            Self::Reset => None,
        }
    }

    fn is_valid_for(&self, count: usize) -> bool {
        match *self {
            Self::Insert { first, last } => first <= last && first <= count,
            Self::Remove { first, last } => first <= last && last < count,
            Self::Move {
                first,
                last,
                destination,
            } => {
                first <= last
                    && last < count
                    && destination <= count
                    && !(first..=last.saturating_add(1)).contains(&destination)
            }
            Self::Reset => true,
        }
    }
}

/// The set of fields a content change covers.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Fields<F> {
    All,
    Only(Vec<F>),
}

impl<F: PartialEq> Fields<F> {
    pub fn contains(&self, field: &F) -> bool {
        match self {
            Self::All => true,
            Self::Only(fields) => fields.contains(field),
        }
    }
}

impl<F> From<&[F]> for Fields<F>
where
    F: Clone,
{
    fn from(fields: &[F]) -> Self {
        Self::Only(fields.to_vec())
    }
}

/// A notification emitted by a projection.
///
/// Structural changes come in pairs: [`ModelChange::AboutTo`] is announced from the current state,
/// the source applies the mutation, then [`ModelChange::Done`] carries the same change together
/// with the resulting row count.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModelChange<F> {
    AboutTo(StructuralChange),
    Done {
        change: StructuralChange,
        row_count: usize,
    },
    ContentChanged {
        first: usize,
        last: usize,
        fields: Fields<F>,
    },
}

/// A consumer callback subscribed to a projection's changes.
pub type ChangeListener<F> = Box<dyn FnMut(&ModelChange<F>)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Fans out [`ModelChange`]s to subscribers while enforcing the two-phase contract.
///
/// It tracks the row count consumers last observed:
/// - A structural change must be announced before its matching completion, one at a time.
/// - Ranges must fit the announced row count.
/// - After completion, the announced count must equal what the source reports.
/// - Content changes must stay within the announced row count.
///
/// Violations are debug-asserted; in release builds the offending notification is dropped.
pub struct ChangeNotifier<F> {
    listeners: Vec<(SubscriptionId, ChangeListener<F>)>,
    next_id: u64,
    in_flight: Option<StructuralChange>,
    row_count: usize,
}

impl<F> Default for ChangeNotifier<F> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
            in_flight: None,
            row_count: 0,
        }
    }
}

impl<F> core::fmt::Debug for ChangeNotifier<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listeners.len())
            .field("in_flight", &self.in_flight)
            .field("row_count", &self.row_count)
            .finish()
    }
}

impl<F> ChangeNotifier<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ModelChange<F>) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(i, _)| *i != id);
        self.listeners.len() != before
    }

    /// The row count consumers have been told about.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// The structural change announced but not yet completed, if any.
    pub fn in_flight(&self) -> Option<StructuralChange> {
        self.in_flight
    }

    fn emit(&mut self, change: &ModelChange<F>) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(change);
        }
    }

    /// Announces a structural change that is about to be applied by the source.
    ///
    /// Returns `false` (and emits nothing) if the change violates the contract.
    pub fn begin(&mut self, change: StructuralChange) -> bool {
        if let Some(prev) = self.in_flight {
            rvwarn!(?prev, ?change, "ChangeNotifier: structural change already in flight");
            debug_assert!(
                false,
                "ChangeNotifier: {change:?} announced while {prev:?} is in flight"
            );
            return false;
        }
        if !change.is_valid_for(self.row_count) {
            rvwarn!(?change, count = self.row_count, "ChangeNotifier: range out of bounds");
            debug_assert!(
                false,
                "ChangeNotifier: {change:?} does not fit a row count of {}",
                self.row_count
            );
            return false;
        }
        rvtrace!(?change, count = self.row_count, "about to apply");
        self.in_flight = Some(change);
        self.emit(&ModelChange::AboutTo(change));
        true
    }

    /// Completes the in-flight structural change. `source_row_count` is the count the source
    /// reports after applying it.
    pub fn end(&mut self, source_row_count: usize) {
        let Some(change) = self.in_flight.take() else {
            rvwarn!(count = source_row_count, "ChangeNotifier: completion without announcement");
            debug_assert!(false, "ChangeNotifier: completion without announcement");
            return;
        };
        let expected = change.apply_to(self.row_count).unwrap_or(source_row_count);
        if expected != source_row_count {
            rvwarn!(
                ?change,
                expected,
                actual = source_row_count,
                "ChangeNotifier: source row count disagrees with the announced change"
            );
            debug_assert_eq!(
                expected, source_row_count,
                "ChangeNotifier: source row count disagrees with {change:?}"
            );
        }
        self.row_count = source_row_count;
        self.emit(&ModelChange::Done {
            change,
            row_count: source_row_count,
        });
    }

    /// Announces and completes a reset in one go.
    pub fn reset(&mut self, source_row_count: usize) {
        if self.begin(StructuralChange::Reset) {
            self.end(source_row_count);
        }
    }

    /// Invalidates `fields` of the rows `[first, last]`.
    pub fn content_changed(&mut self, first: usize, last: usize, fields: Fields<F>) {
        if first > last || last >= self.row_count {
            rvwarn!(
                first,
                last,
                count = self.row_count,
                "ChangeNotifier: content change outside the row space"
            );
            debug_assert!(
                first <= last && last < self.row_count,
                "ChangeNotifier: content change [{first}, {last}] outside a row count of {}",
                self.row_count
            );
            return;
        }
        self.emit(&ModelChange::ContentChanged {
            first,
            last,
            fields,
        });
    }

    pub fn row_changed(&mut self, row: usize, fields: Fields<F>) {
        self.content_changed(row, row, fields);
    }
}

/// A listener that records every change it receives. Handy for tests and adapters that batch
/// work per frame.
#[derive(Debug)]
pub struct ChangeRecorder<F> {
    log: Rc<RefCell<Vec<ModelChange<F>>>>,
}

impl<F> Clone for ChangeRecorder<F> {
    fn clone(&self) -> Self {
        Self {
            log: Rc::clone(&self.log),
        }
    }
}

impl<F> Default for ChangeRecorder<F> {
    fn default() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<F: Clone + 'static> ChangeRecorder<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a listener that appends to this recorder.
    pub fn listener(&self) -> impl FnMut(&ModelChange<F>) + 'static {
        let log = Rc::clone(&self.log);
        move |change| log.borrow_mut().push(change.clone())
    }

    pub fn take(&self) -> Vec<ModelChange<F>> {
        core::mem::take(&mut *self.log.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }
}
