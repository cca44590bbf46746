//! Filtering combinator.
//!
//! `move_next`/`move_previous` skip entries failing the predicate;
//! `move_at` respects the requested direction when the candidate fails,
//! continuing the scan that way. Filtering breaks continuity: a filtered
//! cursor cannot promise a value for every key.

use std::sync::Arc;

use braid_types::Lookup;

use crate::cursor::SeriesCursor;
use crate::live::Completer;
use crate::series::Series;

/// Keeps entries whose `(key, value)` satisfy the predicate.
#[derive(Debug, Clone)]
pub struct Filtered<S, P> {
    source: S,
    predicate: P,
}

impl<S, P> Filtered<S, P> {
    pub(crate) fn new(source: S, predicate: P) -> Self {
        Self { source, predicate }
    }
}

impl<S, P> Series for Filtered<S, P>
where
    S: Series,
    P: Fn(&S::Key, &S::Value) -> bool + Clone,
{
    type Key = S::Key;
    type Value = S::Value;
    type Comparer = S::Comparer;
    type Cursor = FilteredCursor<S::Cursor, P>;

    fn comparer(&self) -> S::Comparer {
        self.source.comparer()
    }

    fn cursor(&self) -> Self::Cursor {
        FilteredCursor {
            inner: self.source.cursor(),
            predicate: self.predicate.clone(),
            valid: false,
        }
    }

    fn is_indexed(&self) -> bool {
        self.source.is_indexed()
    }

    fn is_completed(&self) -> bool {
        self.source.is_completed()
    }

    fn version(&self) -> u64 {
        self.source.version()
    }

    fn completer(&self) -> Option<Arc<Completer>> {
        self.source.completer()
    }
}

/// Cursor for [`Filtered`].
///
/// `valid` records whether the inner position passed the predicate; a
/// failed directional scan leaves the inner cursor wherever it stopped,
/// and accessors go dark until the next successful move.
#[derive(Debug, Clone)]
pub struct FilteredCursor<C, P> {
    inner: C,
    predicate: P,
    valid: bool,
}

impl<C, P> FilteredCursor<C, P>
where
    C: SeriesCursor,
    P: Fn(&C::Key, &C::Value) -> bool + Clone,
{
    fn passes(&self) -> bool {
        self.inner
            .entry()
            .is_some_and(|(k, v)| (self.predicate)(&k, &v))
    }

    fn scan_forward(&mut self) -> bool {
        while self.inner.move_next() {
            if self.passes() {
                self.valid = true;
                return true;
            }
        }
        self.valid = false;
        false
    }

    fn scan_backward(&mut self) -> bool {
        while self.inner.move_previous() {
            if self.passes() {
                self.valid = true;
                return true;
            }
        }
        self.valid = false;
        false
    }

    fn settle(&mut self, moved: bool) -> bool {
        self.valid = moved && self.passes();
        self.valid
    }
}

impl<C, P> SeriesCursor for FilteredCursor<C, P>
where
    C: SeriesCursor,
    P: Fn(&C::Key, &C::Value) -> bool + Clone,
{
    type Key = C::Key;
    type Value = C::Value;
    type Comparer = C::Comparer;

    fn comparer(&self) -> C::Comparer {
        self.inner.comparer()
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.valid = false;
    }

    fn move_first(&mut self) -> bool {
        if !self.inner.move_first() {
            self.valid = false;
            return false;
        }
        if self.passes() {
            self.valid = true;
            return true;
        }
        self.scan_forward()
    }

    fn move_last(&mut self) -> bool {
        if !self.inner.move_last() {
            self.valid = false;
            return false;
        }
        if self.passes() {
            self.valid = true;
            return true;
        }
        self.scan_backward()
    }

    fn move_next(&mut self) -> bool {
        self.scan_forward()
    }

    fn move_previous(&mut self) -> bool {
        self.scan_backward()
    }

    fn move_at(&mut self, key: &C::Key, lookup: Lookup) -> bool {
        if !self.inner.move_at(key, lookup) {
            self.valid = false;
            return false;
        }
        if self.passes() {
            self.valid = true;
            return true;
        }
        match lookup {
            Lookup::Eq => {
                self.valid = false;
                false
            }
            Lookup::Lt | Lookup::Le => self.scan_backward(),
            Lookup::Gt | Lookup::Ge => self.scan_forward(),
        }
    }

    fn key(&self) -> Option<C::Key> {
        if self.valid { self.inner.key() } else { None }
    }

    fn value(&self) -> Option<C::Value> {
        if self.valid { self.inner.value() } else { None }
    }

    fn try_get(&self, key: &C::Key) -> Option<C::Value> {
        self.inner
            .try_get(key)
            .filter(|v| (self.predicate)(key, v))
    }

    fn source_completed(&self) -> bool {
        self.inner.source_completed()
    }

    fn completer(&self) -> Option<Arc<Completer>> {
        self.inner.completer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinators::SeriesOps;
    use crate::sorted_map::SortedMap;

    fn is_even(key: &i64, _value: &i64) -> bool {
        key % 2 == 0
    }

    fn evens() -> Filtered<SortedMap<i64, i64>, fn(&i64, &i64) -> bool> {
        let map: SortedMap<i64, i64> = SortedMap::new();
        for k in 1..=6 {
            map.add(k, k * 10).unwrap();
        }
        map.filter(is_even as fn(&i64, &i64) -> bool)
    }

    #[test]
    fn filter_skips_failing_entries() {
        let view = evens();
        let keys: Vec<_> = view.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![2, 4, 6]);
    }

    #[test]
    fn filter_backward_navigation() {
        let view = evens();
        let mut cursor = view.cursor();
        assert!(cursor.move_last());
        assert_eq!(cursor.key(), Some(6));
        assert!(cursor.move_previous());
        assert_eq!(cursor.key(), Some(4));
        assert!(cursor.move_previous());
        assert_eq!(cursor.key(), Some(2));
        assert!(!cursor.move_previous());
        assert_eq!(cursor.key(), None);
    }

    #[test]
    fn filter_move_at_scans_in_direction() {
        let view = evens();
        let mut cursor = view.cursor();

        // 3 fails the predicate; Ge must continue forward to 4.
        assert!(cursor.move_at(&3, Lookup::Ge));
        assert_eq!(cursor.key(), Some(4));

        // Le from 3 scans back to 2.
        assert!(cursor.move_at(&3, Lookup::Le));
        assert_eq!(cursor.key(), Some(2));

        // Eq on a filtered-out key is a miss.
        assert!(!cursor.move_at(&3, Lookup::Eq));
        assert_eq!(cursor.key(), None);

        assert!(cursor.move_at(&6, Lookup::Eq));
        assert_eq!(cursor.key(), Some(6));
    }

    #[test]
    fn filter_point_lookup() {
        let view = evens();
        assert_eq!(view.try_get(&4), Some(40));
        assert_eq!(view.try_get(&3), None);
    }

    #[test]
    fn filter_breaks_continuity() {
        let view = evens();
        assert!(!view.cursor().is_continuous());
    }
}
