//! Zip: inner join of two series by key.
//!
//! Both inputs must order keys with the same comparer; construction fails
//! otherwise. Discrete sides are advanced leapfrog-style (the lagging
//! side seeks to the leading side's key); a continuous side is never
//! advanced, only sampled at the discrete side's pivots. When both sides
//! are continuous there are no discrete pivots: enumeration is empty, but
//! keyed lookup samples both sides at the probe.
//!
//! Forward/backward re-alignment always starts from the cached join key,
//! so the cursor stays correct when a source mutates between moves.

use std::cmp::Ordering;
use std::sync::Arc;

use braid_error::{BraidError, Result};
use braid_types::{KeyComparer, Lookup};

use crate::cursor::{CursorState, SeriesCursor};
use crate::live::Completer;
use crate::series::Series;

// ---------------------------------------------------------------------------
// Zipped series
// ---------------------------------------------------------------------------

/// Inner join by key; values are `(left, right)` pairs.
#[derive(Debug, Clone)]
pub struct Zipped<L, R> {
    left: L,
    right: R,
}

impl<L, R> Zipped<L, R>
where
    L: Series,
    R: Series<Key = L::Key, Comparer = L::Comparer>,
{
    /// Join two series. Fails with `ComparerMismatch` when the sides
    /// disagree on key order.
    pub fn new(left: L, right: R) -> Result<Self> {
        if left.comparer() != right.comparer() {
            return Err(BraidError::ComparerMismatch);
        }
        Ok(Self { left, right })
    }
}

impl<L, R> Series for Zipped<L, R>
where
    L: Series,
    R: Series<Key = L::Key, Comparer = L::Comparer>,
{
    type Key = L::Key;
    type Value = (L::Value, R::Value);
    type Comparer = L::Comparer;
    type Cursor = ZipCursor<L::Cursor, R::Cursor>;

    fn comparer(&self) -> L::Comparer {
        self.left.comparer()
    }

    fn cursor(&self) -> Self::Cursor {
        ZipCursor {
            left: self.left.cursor(),
            right: self.right.cursor(),
            state: CursorState::Uninitialized,
            current: None,
        }
    }

    fn is_completed(&self) -> bool {
        self.left.is_completed() && self.right.is_completed()
    }

    fn version(&self) -> u64 {
        self.left.version().max(self.right.version())
    }
}

// ---------------------------------------------------------------------------
// ZipCursor
// ---------------------------------------------------------------------------

/// Cursor for [`Zipped`].
pub struct ZipCursor<L, R>
where
    L: SeriesCursor,
    R: SeriesCursor<Key = L::Key, Comparer = L::Comparer>,
{
    left: L,
    right: R,
    state: CursorState,
    pub(crate) current: Option<(L::Key, (L::Value, R::Value))>,
}

impl<L, R> Clone for ZipCursor<L, R>
where
    L: SeriesCursor,
    R: SeriesCursor<Key = L::Key, Comparer = L::Comparer>,
{
    fn clone(&self) -> Self {
        Self {
            left: self.left.clone(),
            right: self.right.clone(),
            state: self.state,
            current: self.current.clone(),
        }
    }
}

impl<L, R> ZipCursor<L, R>
where
    L: SeriesCursor,
    R: SeriesCursor<Key = L::Key, Comparer = L::Comparer>,
{
    fn capture(&mut self, key: L::Key, lv: L::Value, rv: R::Value) -> bool {
        self.current = Some((key, (lv, rv)));
        self.state = CursorState::Positioned;
        true
    }

    fn end(&mut self) -> bool {
        self.state = CursorState::AfterEnd;
        false
    }

    fn start(&mut self) -> bool {
        self.state = CursorState::BeforeStart;
        false
    }

    fn anchor(&self) -> Option<L::Key> {
        self.current.as_ref().map(|(k, _)| k.clone())
    }

    /// Leapfrog both discrete sides to the next common key at or after
    /// their current positions.
    fn align_forward(&mut self) -> bool {
        let comparer = self.left.comparer();
        loop {
            let (Some(lk), Some(rk)) = (self.left.key(), self.right.key()) else {
                return self.end();
            };
            match comparer.compare(&lk, &rk) {
                Ordering::Equal => {
                    let (Some(lv), Some(rv)) = (self.left.value(), self.right.value()) else {
                        return self.end();
                    };
                    return self.capture(lk, lv, rv);
                }
                Ordering::Less => {
                    if !self.left.move_at(&rk, Lookup::Ge) {
                        return self.end();
                    }
                }
                Ordering::Greater => {
                    if !self.right.move_at(&lk, Lookup::Ge) {
                        return self.end();
                    }
                }
            }
        }
    }

    /// Mirror of [`align_forward`](Self::align_forward), moving toward
    /// smaller keys.
    fn align_backward(&mut self) -> bool {
        let comparer = self.left.comparer();
        loop {
            let (Some(lk), Some(rk)) = (self.left.key(), self.right.key()) else {
                return self.start();
            };
            match comparer.compare(&lk, &rk) {
                Ordering::Equal => {
                    let (Some(lv), Some(rv)) = (self.left.value(), self.right.value()) else {
                        return self.start();
                    };
                    return self.capture(lk, lv, rv);
                }
                Ordering::Greater => {
                    if !self.left.move_at(&rk, Lookup::Le) {
                        return self.start();
                    }
                }
                Ordering::Less => {
                    if !self.right.move_at(&lk, Lookup::Le) {
                        return self.start();
                    }
                }
            }
        }
    }

    /// Sample the continuous side at the driver's pivots, scanning the
    /// driver in the given direction until the sample lands.
    fn drive_discrete(&mut self, forward: bool) -> bool {
        loop {
            let (pivot, lv, rv) = {
                let (driver_key, left_sample, right_sample) = if self.left.is_continuous() {
                    let Some(k) = self.right.key() else {
                        return if forward { self.end() } else { self.start() };
                    };
                    let lv = self.left.try_get(&k);
                    let rv = self.right.value();
                    (k, lv, rv)
                } else {
                    let Some(k) = self.left.key() else {
                        return if forward { self.end() } else { self.start() };
                    };
                    let lv = self.left.value();
                    let rv = self.right.try_get(&k);
                    (k, lv, rv)
                };
                match (left_sample, right_sample) {
                    (Some(lv), Some(rv)) => (driver_key, lv, rv),
                    _ => {
                        // Continuous contract says this cannot miss, but a
                        // non-total "continuous" side just skips the pivot.
                        let moved = if self.left.is_continuous() {
                            if forward {
                                self.right.move_next()
                            } else {
                                self.right.move_previous()
                            }
                        } else if forward {
                            self.left.move_next()
                        } else {
                            self.left.move_previous()
                        };
                        if moved {
                            continue;
                        }
                        return if forward { self.end() } else { self.start() };
                    }
                }
            };
            return self.capture(pivot, lv, rv);
        }
    }

    fn join_from(&mut self, forward: bool) -> bool {
        match (self.left.is_continuous(), self.right.is_continuous()) {
            (false, false) => {
                if forward {
                    self.align_forward()
                } else {
                    self.align_backward()
                }
            }
            (true, true) => {
                if forward {
                    self.end()
                } else {
                    self.start()
                }
            }
            _ => self.drive_discrete(forward),
        }
    }

    /// Position the discrete side(s) for a fresh scan from one end.
    fn seek_edge(&mut self, forward: bool) -> bool {
        let (lc, rc) = (self.left.is_continuous(), self.right.is_continuous());
        if lc && rc {
            return if forward { self.start() } else { self.end() };
        }
        let mut ok = true;
        if !lc {
            ok &= if forward {
                self.left.move_first()
            } else {
                self.left.move_last()
            };
        }
        if !rc {
            ok &= if forward {
                self.right.move_first()
            } else {
                self.right.move_last()
            };
        }
        if !ok {
            return if forward { self.start() } else { self.end() };
        }
        self.join_from(forward)
    }

    /// Re-seek both discrete sides strictly past `key` and re-join.
    fn seek_past(&mut self, key: &L::Key, forward: bool) -> bool {
        let lookup = if forward { Lookup::Gt } else { Lookup::Lt };
        let (lc, rc) = (self.left.is_continuous(), self.right.is_continuous());
        if lc && rc {
            return if forward { self.end() } else { self.start() };
        }
        let mut ok = true;
        if !lc {
            ok &= self.left.move_at(key, lookup);
        }
        if !rc {
            ok &= self.right.move_at(key, lookup);
        }
        if !ok {
            return if forward { self.end() } else { self.start() };
        }
        self.join_from(forward)
    }
}

impl<L, R> SeriesCursor for ZipCursor<L, R>
where
    L: SeriesCursor,
    R: SeriesCursor<Key = L::Key, Comparer = L::Comparer>,
{
    type Key = L::Key;
    type Value = (L::Value, R::Value);
    type Comparer = L::Comparer;

    fn comparer(&self) -> L::Comparer {
        self.left.comparer()
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.state = CursorState::Uninitialized;
        self.current = None;
    }

    fn move_first(&mut self) -> bool {
        self.seek_edge(true)
    }

    fn move_last(&mut self) -> bool {
        self.seek_edge(false)
    }

    fn move_next(&mut self) -> bool {
        match self.state {
            CursorState::Uninitialized | CursorState::BeforeStart => self.seek_edge(true),
            CursorState::Positioned | CursorState::AfterEnd => match self.anchor() {
                Some(key) => self.seek_past(&key, true),
                None => self.seek_edge(true),
            },
        }
    }

    fn move_previous(&mut self) -> bool {
        match self.state {
            CursorState::Uninitialized => self.seek_edge(false),
            CursorState::AfterEnd => match self.anchor() {
                // Previous from past-the-end is the last join point.
                Some(key) => {
                    let (lc, rc) = (self.left.is_continuous(), self.right.is_continuous());
                    if lc && rc {
                        return self.start();
                    }
                    let mut ok = true;
                    if !lc {
                        ok &= self.left.move_at(&key, Lookup::Le);
                    }
                    if !rc {
                        ok &= self.right.move_at(&key, Lookup::Le);
                    }
                    if !ok {
                        return self.start();
                    }
                    self.join_from(false)
                }
                None => self.seek_edge(false),
            },
            CursorState::Positioned | CursorState::BeforeStart => match self.anchor() {
                Some(key) => self.seek_past(&key, false),
                None => self.seek_edge(false),
            },
        }
    }

    fn move_at(&mut self, key: &L::Key, lookup: Lookup) -> bool {
        let (lc, rc) = (self.left.is_continuous(), self.right.is_continuous());
        if lc && rc {
            // No discrete pivots: a continuous pair is defined at the
            // probe itself for the equality-admitting directions.
            if !lookup.accepts_equal() {
                return if lookup.accepts_smaller() {
                    self.start()
                } else {
                    self.end()
                };
            }
            let (Some(lv), Some(rv)) = (self.left.try_get(key), self.right.try_get(key)) else {
                return self.start();
            };
            return self.capture(key.clone(), lv, rv);
        }

        let mut ok = true;
        if !lc {
            ok &= self.left.move_at(key, lookup);
        }
        if !rc {
            ok &= self.right.move_at(key, lookup);
        }
        if !ok {
            return match lookup {
                Lookup::Lt | Lookup::Le => self.start(),
                Lookup::Gt | Lookup::Ge => self.end(),
                Lookup::Eq => self.start(),
            };
        }

        match lookup {
            Lookup::Eq => {
                // Both sides must sit exactly on the probe.
                if lc || rc {
                    return self.drive_discrete(true);
                }
                let (Some(lk), Some(rk)) = (self.left.key(), self.right.key()) else {
                    return self.start();
                };
                let comparer = self.left.comparer();
                if comparer.keys_equal(&lk, key) && comparer.keys_equal(&rk, key) {
                    let (Some(lv), Some(rv)) = (self.left.value(), self.right.value()) else {
                        return self.start();
                    };
                    self.capture(lk, lv, rv)
                } else {
                    self.start()
                }
            }
            Lookup::Lt | Lookup::Le => self.join_from(false),
            Lookup::Gt | Lookup::Ge => self.join_from(true),
        }
    }

    fn key(&self) -> Option<L::Key> {
        if self.state.is_positioned() {
            self.current.as_ref().map(|(k, _)| k.clone())
        } else {
            None
        }
    }

    fn value(&self) -> Option<(L::Value, R::Value)> {
        if self.state.is_positioned() {
            self.current.as_ref().map(|(_, pair)| pair.clone())
        } else {
            None
        }
    }

    fn try_get(&self, key: &L::Key) -> Option<(L::Value, R::Value)> {
        match (self.left.try_get(key), self.right.try_get(key)) {
            (Some(lv), Some(rv)) => Some((lv, rv)),
            _ => None,
        }
    }

    fn is_continuous(&self) -> bool {
        self.left.is_continuous() && self.right.is_continuous()
    }

    fn source_completed(&self) -> bool {
        self.left.source_completed() && self.right.source_completed()
    }
}

impl<L, R> std::fmt::Debug for ZipCursor<L, R>
where
    L: SeriesCursor,
    R: SeriesCursor<Key = L::Key, Comparer = L::Comparer>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipCursor")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ZipMapped — fused zip + binary value op
// ---------------------------------------------------------------------------

/// Inner join fused with a binary value op: `f(left, right)` is computed
/// straight from the joined values, no intermediate pair value surfaces.
#[derive(Debug, Clone)]
pub struct ZipMapped<L, R, F> {
    left: L,
    right: R,
    f: F,
}

impl<L, R, F> ZipMapped<L, R, F>
where
    L: Series,
    R: Series<Key = L::Key, Comparer = L::Comparer>,
{
    pub(crate) fn new(left: L, right: R, f: F) -> Result<Self> {
        if left.comparer() != right.comparer() {
            return Err(BraidError::ComparerMismatch);
        }
        Ok(Self { left, right, f })
    }
}

impl<L, R, F, O> Series for ZipMapped<L, R, F>
where
    L: Series,
    R: Series<Key = L::Key, Comparer = L::Comparer>,
    F: Fn(&L::Value, &R::Value) -> O + Clone,
    O: Clone,
{
    type Key = L::Key;
    type Value = O;
    type Comparer = L::Comparer;
    type Cursor = ZipMapCursor<L::Cursor, R::Cursor, F>;

    fn comparer(&self) -> L::Comparer {
        self.left.comparer()
    }

    fn cursor(&self) -> Self::Cursor {
        ZipMapCursor {
            inner: ZipCursor {
                left: self.left.cursor(),
                right: self.right.cursor(),
                state: CursorState::Uninitialized,
                current: None,
            },
            f: self.f.clone(),
        }
    }

    fn is_completed(&self) -> bool {
        self.left.is_completed() && self.right.is_completed()
    }

    fn version(&self) -> u64 {
        self.left.version().max(self.right.version())
    }
}

/// Cursor for [`ZipMapped`].
pub struct ZipMapCursor<L, R, F>
where
    L: SeriesCursor,
    R: SeriesCursor<Key = L::Key, Comparer = L::Comparer>,
{
    inner: ZipCursor<L, R>,
    f: F,
}

impl<L, R, F> Clone for ZipMapCursor<L, R, F>
where
    L: SeriesCursor,
    R: SeriesCursor<Key = L::Key, Comparer = L::Comparer>,
    F: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            f: self.f.clone(),
        }
    }
}

impl<L, R, F, O> SeriesCursor for ZipMapCursor<L, R, F>
where
    L: SeriesCursor,
    R: SeriesCursor<Key = L::Key, Comparer = L::Comparer>,
    F: Fn(&L::Value, &R::Value) -> O + Clone,
    O: Clone,
{
    type Key = L::Key;
    type Value = O;
    type Comparer = L::Comparer;

    fn comparer(&self) -> L::Comparer {
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

    fn move_at(&mut self, key: &L::Key, lookup: Lookup) -> bool {
        self.inner.move_at(key, lookup)
    }

    fn key(&self) -> Option<L::Key> {
        self.inner.key()
    }

    fn value(&self) -> Option<O> {
        if !self.inner.state.is_positioned() {
            return None;
        }
        self.inner
            .current
            .as_ref()
            .map(|(_, (lv, rv))| (self.f)(lv, rv))
    }

    fn try_get(&self, key: &L::Key) -> Option<O> {
        match (self.inner.left.try_get(key), self.inner.right.try_get(key)) {
            (Some(lv), Some(rv)) => Some((self.f)(&lv, &rv)),
            _ => None,
        }
    }

    fn is_continuous(&self) -> bool {
        self.inner.is_continuous()
    }

    fn source_completed(&self) -> bool {
        self.inner.source_completed()
    }

    fn completer(&self) -> Option<Arc<Completer>> {
        None
    }
}

impl<L, R, F> std::fmt::Debug for ZipMapCursor<L, R, F>
where
    L: SeriesCursor,
    R: SeriesCursor<Key = L::Key, Comparer = L::Comparer>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipMapCursor")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinators::SeriesOps;
    use crate::combinators::constant::ConstantSeries;
    use crate::sorted_map::SortedMap;

    fn left_map() -> SortedMap<i64, &'static str> {
        let map = SortedMap::new();
        map.add(1, "a").unwrap();
        map.add(2, "b").unwrap();
        map.add(4, "d").unwrap();
        map
    }

    fn right_map() -> SortedMap<i64, &'static str> {
        let map = SortedMap::new();
        map.add(2, "B").unwrap();
        map.add(3, "C").unwrap();
        map.add(4, "D").unwrap();
        map
    }

    #[test]
    fn zip_is_inner_join() {
        let zipped = left_map().zip(right_map()).unwrap();
        let collected: Vec<_> = zipped.iter().collect();
        assert_eq!(collected, vec![(2, ("b", "B")), (4, ("d", "D"))]);
    }

    #[test]
    fn zip_then_map_concatenates() {
        let joined = left_map()
            .zip(right_map())
            .unwrap()
            .map(|_, (x, y)| format!("{x}{y}"));
        let collected: Vec<_> = joined.iter().collect();
        assert_eq!(
            collected,
            vec![(2, "bB".to_owned()), (4, "dD".to_owned())]
        );
    }

    #[test]
    fn zip_with_fuses_the_pair() {
        let sums = {
            let a: SortedMap<i64, i64> = SortedMap::new();
            let b: SortedMap<i64, i64> = SortedMap::new();
            for k in [1, 2, 4] {
                a.add(k, k * 10).unwrap();
            }
            for k in [2, 3, 4] {
                b.add(k, k).unwrap();
            }
            a.zip_with(b, |x, y| x + y).unwrap()
        };
        let collected: Vec<_> = sums.iter().collect();
        assert_eq!(collected, vec![(2, 22), (4, 44)]);
    }

    #[test]
    fn zip_backward_and_seek() {
        let zipped = left_map().zip(right_map()).unwrap();
        let mut cursor = zipped.cursor();

        assert!(cursor.move_last());
        assert_eq!(cursor.key(), Some(4));
        assert!(cursor.move_previous());
        assert_eq!(cursor.key(), Some(2));
        assert!(!cursor.move_previous());

        assert!(cursor.move_at(&3, Lookup::Ge));
        assert_eq!(cursor.key(), Some(4));
        assert!(cursor.move_at(&3, Lookup::Le));
        assert_eq!(cursor.key(), Some(2));
        assert!(cursor.move_at(&2, Lookup::Eq));
        assert_eq!(cursor.entry(), Some((2, ("b", "B"))));
        assert!(!cursor.move_at(&3, Lookup::Eq));
        assert!(!cursor.move_at(&1, Lookup::Eq), "1 is only on the left");
    }

    #[test]
    fn zip_after_end_resumes_on_new_overlap() {
        let left: SortedMap<i64, i64> = SortedMap::new();
        let right: SortedMap<i64, i64> = SortedMap::new();
        left.add(1, 10).unwrap();
        right.add(1, 100).unwrap();
        let zipped = left.clone().zip(right.clone()).unwrap();
        let mut cursor = zipped.cursor();
        assert!(cursor.move_next());
        assert_eq!(cursor.key(), Some(1));
        assert!(!cursor.move_next());

        left.add(5, 50).unwrap();
        right.add(5, 500).unwrap();
        assert!(cursor.move_next());
        assert_eq!(cursor.entry(), Some((5, (50, 500))));
    }

    #[test]
    fn zip_with_continuous_side_samples_at_discrete_keys() {
        let discrete: SortedMap<i64, i64> = SortedMap::new();
        for k in [1, 3, 5] {
            discrete.add(k, k * 10).unwrap();
        }
        let constant: ConstantSeries<i64, i64> = ConstantSeries::new(7);
        let zipped = discrete.zip(constant).unwrap();
        let collected: Vec<_> = zipped.iter().collect();
        assert_eq!(
            collected,
            vec![(1, (10, 7)), (3, (30, 7)), (5, (50, 7))]
        );
        assert!(!zipped.cursor().is_continuous());
    }

    #[test]
    fn zip_two_continuous_sides_is_keyed_only() {
        let a: ConstantSeries<i64, i64> = ConstantSeries::new(2);
        let b: ConstantSeries<i64, i64> = ConstantSeries::new(3);
        let zipped = a.zip(b).unwrap();
        let mut cursor = zipped.cursor();
        assert!(!cursor.move_first());
        assert!(cursor.move_at(&42, Lookup::Eq));
        assert_eq!(cursor.entry(), Some((42, (2, 3))));
        assert!(cursor.is_continuous());
        assert_eq!(cursor.try_get(&7), Some((2, 3)));
    }

    #[test]
    fn zip_point_lookup() {
        let zipped = left_map().zip(right_map()).unwrap();
        let cursor = zipped.cursor();
        assert_eq!(cursor.try_get(&2), Some(("b", "B")));
        assert_eq!(cursor.try_get(&1), None);
        assert_eq!(cursor.try_get(&3), None);
    }
}
