//! The `Series` trait: an ordered, possibly lazy, possibly live mapping.
//!
//! A series is anything that can hand out a cursor: a materialized
//! [`SortedMap`](crate::sorted_map::SortedMap), a derived view built from
//! combinators, or a constant. The trait carries the metadata shared by
//! all of them; navigation itself lives on the cursor.

use std::sync::Arc;

use braid_types::KeyComparer;

use crate::cursor::{CursorIter, SeriesCursor};
use crate::live::Completer;

/// An ordered mapping from `Key` to `Value`, navigated through cursors.
pub trait Series {
    type Key: Clone;
    type Value: Clone;
    type Comparer: KeyComparer<Self::Key>;
    type Cursor: SeriesCursor<Key = Self::Key, Value = Self::Value, Comparer = Self::Comparer>;

    /// The total order on keys.
    fn comparer(&self) -> Self::Comparer;

    /// A fresh, uninitialized cursor over this series.
    fn cursor(&self) -> Self::Cursor;

    /// When true, keys are in insertion order rather than comparer order.
    fn is_indexed(&self) -> bool {
        false
    }

    /// Terminal flag: no further updates will occur.
    fn is_completed(&self) -> bool;

    /// Monotonic mutation counter; derived series report their source's.
    fn version(&self) -> u64;

    /// Completion broadcaster, when this series supports live
    /// subscription.
    fn completer(&self) -> Option<Arc<Completer>> {
        None
    }

    /// Smallest entry, if any.
    fn first(&self) -> Option<(Self::Key, Self::Value)> {
        let mut c = self.cursor();
        if c.move_first() { c.entry() } else { None }
    }

    /// Largest entry, if any.
    fn last(&self) -> Option<(Self::Key, Self::Value)> {
        let mut c = self.cursor();
        if c.move_last() { c.entry() } else { None }
    }

    /// Point lookup.
    fn try_get(&self, key: &Self::Key) -> Option<Self::Value> {
        self.cursor().try_get(key)
    }

    /// Whether the series currently has no entries.
    fn is_empty(&self) -> bool {
        !self.cursor().move_first()
    }

    /// Iterate entries in key order.
    fn iter(&self) -> CursorIter<Self::Cursor> {
        CursorIter::new(self.cursor())
    }
}
