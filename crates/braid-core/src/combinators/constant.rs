//! Constant (continuous) series.
//!
//! Yields the same value for every key: the simplest continuous cursor.
//! It has no discrete positions, so enumeration is empty; keyed lookup
//! always lands. Zipping a discrete series against a constant samples the
//! constant at the discrete side's keys.

use std::marker::PhantomData;

use braid_types::{KeyComparer, Lookup, NaturalComparer};

use crate::cursor::{CursorState, SeriesCursor};
use crate::series::Series;

/// A series defined at every key with one fixed value.
#[derive(Debug, Clone)]
pub struct ConstantSeries<K, V, C = NaturalComparer> {
    value: V,
    comparer: C,
    _key: PhantomData<fn() -> K>,
}

impl<K: Ord + Clone, V: Clone> ConstantSeries<K, V, NaturalComparer> {
    /// Constant series over the natural key order.
    #[must_use]
    pub fn new(value: V) -> Self {
        Self::with_comparer(value, NaturalComparer)
    }
}

impl<K: Clone, V: Clone, C: KeyComparer<K>> ConstantSeries<K, V, C> {
    /// Constant series over an explicit comparer.
    #[must_use]
    pub fn with_comparer(value: V, comparer: C) -> Self {
        Self {
            value,
            comparer,
            _key: PhantomData,
        }
    }
}

impl<K, V, C> Series for ConstantSeries<K, V, C>
where
    K: Clone,
    V: Clone,
    C: KeyComparer<K>,
{
    type Key = K;
    type Value = V;
    type Comparer = C;
    type Cursor = ConstantCursor<K, V, C>;

    fn comparer(&self) -> C {
        self.comparer.clone()
    }

    fn cursor(&self) -> Self::Cursor {
        ConstantCursor {
            value: self.value.clone(),
            comparer: self.comparer.clone(),
            state: CursorState::Uninitialized,
            at: None,
        }
    }

    fn is_completed(&self) -> bool {
        true
    }

    fn version(&self) -> u64 {
        0
    }
}

/// Cursor for [`ConstantSeries`].
#[derive(Debug, Clone)]
pub struct ConstantCursor<K, V, C> {
    value: V,
    comparer: C,
    state: CursorState,
    at: Option<K>,
}

impl<K, V, C> SeriesCursor for ConstantCursor<K, V, C>
where
    K: Clone,
    V: Clone,
    C: KeyComparer<K>,
{
    type Key = K;
    type Value = V;
    type Comparer = C;

    fn comparer(&self) -> C {
        self.comparer.clone()
    }

    fn reset(&mut self) {
        self.state = CursorState::Uninitialized;
        self.at = None;
    }

    fn move_first(&mut self) -> bool {
        self.state = CursorState::BeforeStart;
        false
    }

    fn move_last(&mut self) -> bool {
        self.state = CursorState::AfterEnd;
        false
    }

    fn move_next(&mut self) -> bool {
        self.state = CursorState::AfterEnd;
        false
    }

    fn move_previous(&mut self) -> bool {
        self.state = CursorState::BeforeStart;
        false
    }

    fn move_at(&mut self, key: &K, lookup: Lookup) -> bool {
        // Defined at every key, but "strictly beside the probe" has no
        // witness without discrete neighbours.
        if !lookup.accepts_equal() {
            self.state = if lookup.accepts_smaller() {
                CursorState::BeforeStart
            } else {
                CursorState::AfterEnd
            };
            return false;
        }
        self.at = Some(key.clone());
        self.state = CursorState::Positioned;
        true
    }

    fn key(&self) -> Option<K> {
        if self.state.is_positioned() {
            self.at.clone()
        } else {
            None
        }
    }

    fn value(&self) -> Option<V> {
        if self.state.is_positioned() {
            Some(self.value.clone())
        } else {
            None
        }
    }

    fn try_get(&self, _key: &K) -> Option<V> {
        Some(self.value.clone())
    }

    fn is_continuous(&self) -> bool {
        true
    }

    fn source_completed(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_at_every_key() {
        let series: ConstantSeries<i64, &str> = ConstantSeries::new("k");
        let cursor = series.cursor();
        assert!(cursor.is_continuous());
        assert_eq!(cursor.try_get(&-5), Some("k"));
        assert_eq!(cursor.try_get(&1_000_000), Some("k"));
    }

    #[test]
    fn no_discrete_positions() {
        let series: ConstantSeries<i64, i64> = ConstantSeries::new(1);
        let mut cursor = series.cursor();
        assert!(!cursor.move_first());
        assert!(!cursor.move_next());
        assert!(!cursor.move_last());
        assert_eq!(series.first(), None);
    }

    #[test]
    fn keyed_positioning() {
        let series: ConstantSeries<i64, i64> = ConstantSeries::new(9);
        let mut cursor = series.cursor();
        assert!(cursor.move_at(&3, Lookup::Eq));
        assert_eq!(cursor.entry(), Some((3, 9)));
        assert!(cursor.move_at(&3, Lookup::Le));
        assert!(!cursor.move_at(&3, Lookup::Lt));
        assert_eq!(cursor.key(), None);
    }
}
