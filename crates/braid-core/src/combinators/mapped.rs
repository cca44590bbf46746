//! Value-mapping combinator.
//!
//! Navigation delegates to the inner cursor untouched; the mapping
//! function runs lazily, on value access only.

use std::sync::Arc;

use braid_types::Lookup;

use crate::cursor::SeriesCursor;
use crate::live::Completer;
use crate::series::Series;

/// Lazily maps values with `f(key, value)`. Keys and order are preserved.
#[derive(Debug, Clone)]
pub struct Mapped<S, F> {
    source: S,
    f: F,
}

impl<S, F> Mapped<S, F> {
    pub(crate) fn new(source: S, f: F) -> Self {
        Self { source, f }
    }
}

impl<S, F, O> Series for Mapped<S, F>
where
    S: Series,
    F: Fn(&S::Key, &S::Value) -> O + Clone,
    O: Clone,
{
    type Key = S::Key;
    type Value = O;
    type Comparer = S::Comparer;
    type Cursor = MappedCursor<S::Cursor, F>;

    fn comparer(&self) -> S::Comparer {
        self.source.comparer()
    }

    fn cursor(&self) -> Self::Cursor {
        MappedCursor {
            inner: self.source.cursor(),
            f: self.f.clone(),
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

/// Cursor for [`Mapped`].
#[derive(Debug, Clone)]
pub struct MappedCursor<C, F> {
    inner: C,
    f: F,
}

impl<C, F, O> SeriesCursor for MappedCursor<C, F>
where
    C: SeriesCursor,
    F: Fn(&C::Key, &C::Value) -> O + Clone,
    O: Clone,
{
    type Key = C::Key;
    type Value = O;
    type Comparer = C::Comparer;

    fn comparer(&self) -> C::Comparer {
        self.inner.comparer()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn move_first(&mut self) -> bool {
        self.inner.move_first()
    }

    fn move_last(&mut self) -> bool {
        self.inner.move_last()
    }

    fn move_next(&mut self) -> bool {
        self.inner.move_next()
    }

    fn move_previous(&mut self) -> bool {
        self.inner.move_previous()
    }

    fn move_at(&mut self, key: &C::Key, lookup: Lookup) -> bool {
        self.inner.move_at(key, lookup)
    }

    fn key(&self) -> Option<C::Key> {
        self.inner.key()
    }

    fn value(&self) -> Option<O> {
        self.inner.entry().map(|(k, v)| (self.f)(&k, &v))
    }

    fn try_get(&self, key: &C::Key) -> Option<O> {
        self.inner.try_get(key).map(|v| (self.f)(key, &v))
    }

    fn is_continuous(&self) -> bool {
        self.inner.is_continuous()
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

    #[test]
    fn map_is_lazy_and_preserves_keys() {
        let map: SortedMap<i64, i64> = SortedMap::new();
        map.add(1, 10).unwrap();
        map.add(2, 20).unwrap();
        let doubled = map.clone().map(|_, v| v * 2);
        let collected: Vec<_> = doubled.iter().collect();
        assert_eq!(collected, vec![(1, 20), (2, 40)]);
        // Source is untouched and keeps versioning for the view.
        assert_eq!(map.try_get(&1), Some(10));
        assert_eq!(doubled.version(), map.version());
    }

    #[test]
    fn map_sees_source_updates() {
        let map: SortedMap<i64, i64> = SortedMap::new();
        map.add(1, 1).unwrap();
        let view = map.clone().map(|k, v| k + v);
        map.add(2, 5).unwrap();
        let collected: Vec<_> = view.iter().collect();
        assert_eq!(collected, vec![(1, 2), (2, 7)]);
    }

    #[test]
    fn map_point_lookup() {
        let map: SortedMap<i64, i64> = SortedMap::new();
        map.add(3, 30).unwrap();
        let view = map.map(|_, v| v + 1);
        assert_eq!(view.try_get(&3), Some(31));
        assert_eq!(view.try_get(&4), None);
    }
}
