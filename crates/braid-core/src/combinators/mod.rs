//! Lazy cursor combinators.
//!
//! Each combinator is a series wrapping its source(s) by value, and its
//! cursor nests the child cursors the same way, so a composed pipeline
//! monomorphizes into one flat cursor with no heap indirection. Nothing is
//! evaluated until a cursor is driven.
//!
//! [`SeriesOps`] is the builder surface: `map`, `filter`, the scalar
//! arithmetic and comparison shorthands, and `zip`/`zip_with`.

pub mod constant;
pub mod filtered;
pub mod mapped;
pub mod ops;
pub mod zipped;

pub use constant::{ConstantCursor, ConstantSeries};
pub use filtered::{Filtered, FilteredCursor};
pub use mapped::{Mapped, MappedCursor};
pub use ops::{
    CmpCursor, CmpSeries, EqValue, GeValue, GtValue, LeValue, LtValue, Minus, MinusFrom, OpCursor,
    OpSeries, Over, OverFrom, Plus, Times, ValueOp, ValuePredicate,
};
pub use zipped::{ZipCursor, ZipMapCursor, ZipMapped, Zipped};

use braid_error::Result;

use crate::series::Series;

/// Builder methods producing lazy combinator series.
///
/// Scalar shorthands are bounded by the op adapters themselves, so they
/// exist exactly when the value type supports the operator.
pub trait SeriesOps: Series + Sized {
    /// Lazily transform values with `f(key, value)`.
    fn map<F, O>(self, f: F) -> Mapped<Self, F>
    where
        F: Fn(&Self::Key, &Self::Value) -> O + Clone,
        O: Clone,
    {
        Mapped::new(self, f)
    }

    /// Keep only entries whose `(key, value)` satisfy the predicate.
    fn filter<P>(self, predicate: P) -> Filtered<Self, P>
    where
        P: Fn(&Self::Key, &Self::Value) -> bool + Clone,
    {
        Filtered::new(self, predicate)
    }

    /// Apply a scalar value op to every value.
    fn apply_op<O>(self, op: O) -> OpSeries<Self, O>
    where
        O: ValueOp<Self::Value>,
    {
        OpSeries::new(self, op)
    }

    /// `value + constant`.
    fn plus(self, constant: Self::Value) -> OpSeries<Self, Plus<Self::Value>>
    where
        Plus<Self::Value>: ValueOp<Self::Value>,
    {
        self.apply_op(Plus(constant))
    }

    /// `value - constant`.
    fn minus(self, constant: Self::Value) -> OpSeries<Self, Minus<Self::Value>>
    where
        Minus<Self::Value>: ValueOp<Self::Value>,
    {
        self.apply_op(Minus(constant))
    }

    /// `value * constant`.
    fn times(self, constant: Self::Value) -> OpSeries<Self, Times<Self::Value>>
    where
        Times<Self::Value>: ValueOp<Self::Value>,
    {
        self.apply_op(Times(constant))
    }

    /// `value / constant`.
    fn over(self, constant: Self::Value) -> OpSeries<Self, Over<Self::Value>>
    where
        Over<Self::Value>: ValueOp<Self::Value>,
    {
        self.apply_op(Over(constant))
    }

    /// `constant - value` (the reversed form).
    fn minus_from(self, constant: Self::Value) -> OpSeries<Self, MinusFrom<Self::Value>>
    where
        MinusFrom<Self::Value>: ValueOp<Self::Value>,
    {
        self.apply_op(MinusFrom(constant))
    }

    /// `constant / value` (the reversed form).
    fn over_from(self, constant: Self::Value) -> OpSeries<Self, OverFrom<Self::Value>>
    where
        OverFrom<Self::Value>: ValueOp<Self::Value>,
    {
        self.apply_op(OverFrom(constant))
    }

    /// Apply a scalar comparison, producing a `bool`-valued series.
    fn compare_with<P>(self, predicate: P) -> CmpSeries<Self, P>
    where
        P: ValuePredicate<Self::Value>,
    {
        CmpSeries::new(self, predicate)
    }

    /// `value > constant` as a `bool` series.
    fn gt(self, constant: Self::Value) -> CmpSeries<Self, GtValue<Self::Value>>
    where
        GtValue<Self::Value>: ValuePredicate<Self::Value>,
    {
        self.compare_with(GtValue(constant))
    }

    /// `value >= constant` as a `bool` series.
    fn ge(self, constant: Self::Value) -> CmpSeries<Self, GeValue<Self::Value>>
    where
        GeValue<Self::Value>: ValuePredicate<Self::Value>,
    {
        self.compare_with(GeValue(constant))
    }

    /// `value < constant` as a `bool` series.
    fn lt(self, constant: Self::Value) -> CmpSeries<Self, LtValue<Self::Value>>
    where
        LtValue<Self::Value>: ValuePredicate<Self::Value>,
    {
        self.compare_with(LtValue(constant))
    }

    /// `value <= constant` as a `bool` series.
    fn le(self, constant: Self::Value) -> CmpSeries<Self, LeValue<Self::Value>>
    where
        LeValue<Self::Value>: ValuePredicate<Self::Value>,
    {
        self.compare_with(LeValue(constant))
    }

    /// `value == constant` as a `bool` series.
    fn eq_value(self, constant: Self::Value) -> CmpSeries<Self, EqValue<Self::Value>>
    where
        EqValue<Self::Value>: ValuePredicate<Self::Value>,
    {
        self.compare_with(EqValue(constant))
    }

    /// Inner join by key: the result holds `(left, right)` value pairs at
    /// the keys both sides produce. Fails when the comparers disagree.
    fn zip<R>(self, other: R) -> Result<Zipped<Self, R>>
    where
        R: Series<Key = Self::Key, Comparer = Self::Comparer>,
    {
        Zipped::new(self, other)
    }

    /// Inner join fused with a binary value op, skipping the pair.
    fn zip_with<R, F, O>(self, other: R, f: F) -> Result<ZipMapped<Self, R, F>>
    where
        R: Series<Key = Self::Key, Comparer = Self::Comparer>,
        F: Fn(&Self::Value, &R::Value) -> O + Clone,
        O: Clone,
    {
        ZipMapped::new(self, other, f)
    }
}

impl<S: Series + Sized> SeriesOps for S {}
