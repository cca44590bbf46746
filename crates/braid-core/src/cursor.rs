//! Series cursor contract.
//!
//! A cursor is a navigable position over a series. Combinator cursors nest
//! their children by value, so the whole composed cursor monomorphizes
//! into one flat struct with no heap indirection; this trait is the
//! uniform surface at the API boundary.
//!
//! # Position states
//!
//! ```text
//! Uninitialized ──move_*──▶ Positioned ◀──▶ BeforeStart / AfterEnd
//! ```
//!
//! A successful move leaves the cursor `Positioned`; a failed forward move
//! leaves it `AfterEnd`, a failed backward move `BeforeStart`. Both edge
//! states stay navigable: `move_next` at `AfterEnd` retries against the
//! source, which is what lets a live tail pick up appended data, and
//! `move_previous` at `BeforeStart` does the symmetric thing.

use std::sync::Arc;

use braid_types::{KeyComparer, Lookup};

use crate::live::Completer;

/// Navigation state of a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Freshly created or reset; no position yet.
    Uninitialized,
    /// Logically before the first element.
    BeforeStart,
    /// On an element; key/value access is defined.
    Positioned,
    /// Logically after the last element.
    AfterEnd,
}

impl CursorState {
    /// Whether key/value access is defined in this state.
    #[must_use]
    pub const fn is_positioned(self) -> bool {
        matches!(self, Self::Positioned)
    }
}

/// A navigable position over a series.
///
/// Cursors are cheaply cloneable: a clone is an independent position over
/// the same logical source. Key/value accessors return owned values
/// because the underlying container may mutate between calls; positioning
/// operations capture the element they land on.
pub trait SeriesCursor: Clone {
    type Key: Clone;
    type Value: Clone;
    type Comparer: KeyComparer<Self::Key>;

    /// The comparer shared with the source series.
    fn comparer(&self) -> Self::Comparer;

    /// Forget the current position, returning to `Uninitialized`.
    fn reset(&mut self);

    /// Move to the first element. `false` iff the series has none.
    fn move_first(&mut self) -> bool;

    /// Move to the last element. `false` iff the series has none.
    fn move_last(&mut self) -> bool;

    /// Advance to the next element (the first, from `Uninitialized` or
    /// `BeforeStart`). `false` leaves the cursor `AfterEnd`.
    fn move_next(&mut self) -> bool;

    /// Step back to the previous element (the last, from `Uninitialized`
    /// or `AfterEnd`). `false` leaves the cursor `BeforeStart`.
    fn move_previous(&mut self) -> bool;

    /// Position at the element selected by `key` and `lookup`.
    ///
    /// On a miss the cursor lands `BeforeStart` (when nothing on or below
    /// the probe satisfies the direction) or `AfterEnd` (nothing on or
    /// above it).
    fn move_at(&mut self, key: &Self::Key, lookup: Lookup) -> bool;

    /// Current key, when positioned.
    fn key(&self) -> Option<Self::Key>;

    /// Current value, when positioned.
    fn value(&self) -> Option<Self::Value>;

    /// Current entry, when positioned.
    fn entry(&self) -> Option<(Self::Key, Self::Value)> {
        match (self.key(), self.value()) {
            (Some(k), Some(v)) => Some((k, v)),
            _ => None,
        }
    }

    /// Point lookup without moving this cursor.
    fn try_get(&self, key: &Self::Key) -> Option<Self::Value> {
        let mut probe = self.clone();
        if probe.move_at(key, Lookup::Eq) {
            probe.value()
        } else {
            None
        }
    }

    /// Whether the cursor yields a value for every key asked of it, not
    /// only at discrete positions. Affects zip sampling.
    fn is_continuous(&self) -> bool {
        false
    }

    /// Whether the source series is completed (frozen).
    fn source_completed(&self) -> bool;

    /// Handle to the source's completion broadcaster, when the source
    /// supports live subscription.
    fn completer(&self) -> Option<Arc<Completer>> {
        None
    }
}

// ---------------------------------------------------------------------------
// Iterator adapter
// ---------------------------------------------------------------------------

/// Drives a cursor as a forward `Iterator` over owned entries.
#[derive(Debug, Clone)]
pub struct CursorIter<C> {
    cursor: C,
    started: bool,
}

impl<C> CursorIter<C> {
    /// Wrap a cursor; iteration starts from the first element regardless
    /// of the cursor's current position.
    pub fn new(mut cursor: C) -> Self
    where
        C: SeriesCursor,
    {
        cursor.reset();
        Self {
            cursor,
            started: false,
        }
    }
}

impl<C: SeriesCursor> Iterator for CursorIter<C> {
    type Item = (C::Key, C::Value);

    fn next(&mut self) -> Option<Self::Item> {
        let moved = if self.started {
            self.cursor.move_next()
        } else {
            self.started = true;
            self.cursor.move_first()
        };
        if moved { self.cursor.entry() } else { None }
    }
}
