//! Scalar value ops and comparisons.
//!
//! The pluggable "op tables" of the series algebra are small adapter
//! structs over `std::ops`/`PartialOrd` bounds: [`Plus`], [`Minus`] and
//! friends implement [`ValueOp`], the comparison adapters implement
//! [`ValuePredicate`]. [`OpSeries`] applies an op to every value;
//! [`CmpSeries`] produces a `bool`-valued series. Keys, order, and
//! continuity are untouched by both.

use std::ops::{Add, Div, Mul, Sub};
use std::sync::Arc;

use braid_types::Lookup;

use crate::cursor::SeriesCursor;
use crate::live::Completer;
use crate::series::Series;

/// A unary value transform with an embedded constant.
pub trait ValueOp<V>: Clone {
    fn apply(&self, value: &V) -> V;
}

/// A unary value predicate with an embedded constant.
pub trait ValuePredicate<V>: Clone {
    fn test(&self, value: &V) -> bool;
}

macro_rules! value_op {
    ($(#[$doc:meta])* $name:ident, $bound:ident, $apply:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name<V>(pub V);

        impl<V> ValueOp<V> for $name<V>
        where
            V: $bound<Output = V> + Copy,
        {
            #[inline]
            fn apply(&self, value: &V) -> V {
                let f: fn(V, V) -> V = $apply;
                f(*value, self.0)
            }
        }
    };
}

value_op!(
    /// `value + constant`.
    Plus, Add, |v, c| v + c
);
value_op!(
    /// `value - constant`.
    Minus, Sub, |v, c| v - c
);
value_op!(
    /// `value * constant`.
    Times, Mul, |v, c| v * c
);
value_op!(
    /// `value / constant`.
    Over, Div, |v, c| v / c
);
value_op!(
    /// `constant - value`.
    MinusFrom, Sub, |v, c| c - v
);
value_op!(
    /// `constant / value`.
    OverFrom, Div, |v, c| c / v
);

macro_rules! value_predicate {
    ($(#[$doc:meta])* $name:ident, $bound:ident, $test:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name<V>(pub V);

        impl<V> ValuePredicate<V> for $name<V>
        where
            V: $bound + Copy,
        {
            #[inline]
            fn test(&self, value: &V) -> bool {
                let f: fn(V, V) -> bool = $test;
                f(*value, self.0)
            }
        }
    };
}

value_predicate!(
    /// `value > constant`.
    GtValue, PartialOrd, |v, c| v > c
);
value_predicate!(
    /// `value >= constant`.
    GeValue, PartialOrd, |v, c| v >= c
);
value_predicate!(
    /// `value < constant`.
    LtValue, PartialOrd, |v, c| v < c
);
value_predicate!(
    /// `value <= constant`.
    LeValue, PartialOrd, |v, c| v <= c
);
value_predicate!(
    /// `value == constant`.
    EqValue, PartialEq, |v, c| v == c
);

// ---------------------------------------------------------------------------
// OpSeries
// ---------------------------------------------------------------------------

/// Applies a [`ValueOp`] to every value of the source.
#[derive(Debug, Clone)]
pub struct OpSeries<S, O> {
    source: S,
    op: O,
}

impl<S, O> OpSeries<S, O> {
    pub(crate) fn new(source: S, op: O) -> Self {
        Self { source, op }
    }
}

impl<S, O> Series for OpSeries<S, O>
where
    S: Series,
    O: ValueOp<S::Value>,
{
    type Key = S::Key;
    type Value = S::Value;
    type Comparer = S::Comparer;
    type Cursor = OpCursor<S::Cursor, O>;

    fn comparer(&self) -> S::Comparer {
        self.source.comparer()
    }

    fn cursor(&self) -> Self::Cursor {
        OpCursor {
            inner: self.source.cursor(),
            op: self.op.clone(),
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

/// Cursor for [`OpSeries`].
#[derive(Debug, Clone)]
pub struct OpCursor<C, O> {
    inner: C,
    op: O,
}

impl<C, O> SeriesCursor for OpCursor<C, O>
where
    C: SeriesCursor,
    O: ValueOp<C::Value>,
{
    type Key = C::Key;
    type Value = C::Value;
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

    fn value(&self) -> Option<C::Value> {
        self.inner.value().map(|v| self.op.apply(&v))
    }

    fn try_get(&self, key: &C::Key) -> Option<C::Value> {
        self.inner.try_get(key).map(|v| self.op.apply(&v))
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

// ---------------------------------------------------------------------------
// CmpSeries
// ---------------------------------------------------------------------------

/// Applies a [`ValuePredicate`], yielding `bool` values at every key.
#[derive(Debug, Clone)]
pub struct CmpSeries<S, P> {
    source: S,
    predicate: P,
}

impl<S, P> CmpSeries<S, P> {
    pub(crate) fn new(source: S, predicate: P) -> Self {
        Self { source, predicate }
    }
}

impl<S, P> Series for CmpSeries<S, P>
where
    S: Series,
    P: ValuePredicate<S::Value>,
{
    type Key = S::Key;
    type Value = bool;
    type Comparer = S::Comparer;
    type Cursor = CmpCursor<S::Cursor, P>;

    fn comparer(&self) -> S::Comparer {
        self.source.comparer()
    }

    fn cursor(&self) -> Self::Cursor {
        CmpCursor {
            inner: self.source.cursor(),
            predicate: self.predicate.clone(),
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

/// Cursor for [`CmpSeries`].
#[derive(Debug, Clone)]
pub struct CmpCursor<C, P> {
    inner: C,
    predicate: P,
}

impl<C, P> SeriesCursor for CmpCursor<C, P>
where
    C: SeriesCursor,
    P: ValuePredicate<C::Value>,
{
    type Key = C::Key;
    type Value = bool;
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

    fn value(&self) -> Option<bool> {
        self.inner.value().map(|v| self.predicate.test(&v))
    }

    fn try_get(&self, key: &C::Key) -> Option<bool> {
        self.inner.try_get(key).map(|v| self.predicate.test(&v))
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
    use crate::series::Series;
    use crate::sorted_map::SortedMap;

    fn base() -> SortedMap<i64, i64> {
        let map = SortedMap::new();
        map.add(1, 10).unwrap();
        map.add(2, 20).unwrap();
        map.add(3, 30).unwrap();
        map
    }

    #[test]
    fn scalar_arithmetic() {
        let map = base();
        let plus: Vec<_> = map.clone().plus(5).iter().collect();
        assert_eq!(plus, vec![(1, 15), (2, 25), (3, 35)]);
        let minus: Vec<_> = map.clone().minus(5).iter().collect();
        assert_eq!(minus, vec![(1, 5), (2, 15), (3, 25)]);
        let times: Vec<_> = map.clone().times(2).iter().collect();
        assert_eq!(times, vec![(1, 20), (2, 40), (3, 60)]);
        let over: Vec<_> = map.clone().over(10).iter().collect();
        assert_eq!(over, vec![(1, 1), (2, 2), (3, 3)]);
        // Source stays untouched.
        assert_eq!(map.try_get(&1), Some(10));
    }

    #[test]
    fn reversed_forms() {
        let map = base();
        let from: Vec<_> = map.clone().minus_from(100).iter().collect();
        assert_eq!(from, vec![(1, 90), (2, 80), (3, 70)]);
        let over_from: Vec<_> = map.over_from(60).iter().collect();
        assert_eq!(over_from, vec![(1, 6), (2, 3), (3, 2)]);
    }

    #[test]
    fn comparisons_yield_bool_series() {
        let map = base();
        let gt: Vec<_> = map.clone().gt(15).iter().collect();
        assert_eq!(gt, vec![(1, false), (2, true), (3, true)]);
        let le: Vec<_> = map.clone().le(20).iter().collect();
        assert_eq!(le, vec![(1, true), (2, true), (3, false)]);
        let eq: Vec<_> = map.eq_value(20).iter().collect();
        assert_eq!(eq, vec![(1, false), (2, true), (3, false)]);
    }

    #[test]
    fn ops_track_source_version() {
        let map = base();
        let view = map.clone().plus(1);
        let v = view.version();
        map.add(4, 40).unwrap();
        assert_eq!(view.version(), v + 1);
        assert_eq!(view.try_get(&4), Some(41));
    }

    #[test]
    fn ops_compose() {
        let map = base();
        let view = map.plus(5).times(2);
        let collected: Vec<_> = view.iter().collect();
        assert_eq!(collected, vec![(1, 30), (2, 50), (3, 70)]);
    }
}
