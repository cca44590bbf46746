//! Lookup directions and refined miss reasons.
//!
//! `move_at` and ranged removal share one direction vocabulary. A failed
//! lookup carries a [`MissReason`] so that bulk removal can distinguish
//! "pivot outside the range on the removal side" (a no-op) from "pivot
//! inside the range but absent" (still selects a half-range).

/// How a keyed lookup resolves when the exact key is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    /// Exact match only.
    Eq,
    /// Largest key strictly less than the probe.
    Lt,
    /// Largest key less than or equal to the probe.
    Le,
    /// Smallest key strictly greater than the probe.
    Gt,
    /// Smallest key greater than or equal to the probe.
    Ge,
}

impl Lookup {
    /// Whether a miss may resolve to a smaller key.
    #[must_use]
    pub const fn accepts_smaller(self) -> bool {
        matches!(self, Self::Lt | Self::Le)
    }

    /// Whether a miss may resolve to a larger key.
    #[must_use]
    pub const fn accepts_larger(self) -> bool {
        matches!(self, Self::Gt | Self::Ge)
    }

    /// Whether an exact hit satisfies the lookup.
    #[must_use]
    pub const fn accepts_equal(self) -> bool {
        matches!(self, Self::Eq | Self::Le | Self::Ge)
    }
}

/// Why a keyed lookup failed to position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissReason {
    /// The container has no elements.
    Empty,
    /// Every present key is greater than the probe.
    BelowRange,
    /// Every present key is smaller than the probe.
    AboveRange,
    /// The probe falls inside the key range but no element satisfies the
    /// direction (only possible for `Eq`, or any direction in indexed
    /// mode).
    Absent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_predicates() {
        assert!(Lookup::Lt.accepts_smaller());
        assert!(Lookup::Le.accepts_smaller());
        assert!(!Lookup::Ge.accepts_smaller());

        assert!(Lookup::Gt.accepts_larger());
        assert!(Lookup::Ge.accepts_larger());
        assert!(!Lookup::Le.accepts_larger());

        assert!(Lookup::Eq.accepts_equal());
        assert!(Lookup::Le.accepts_equal());
        assert!(Lookup::Ge.accepts_equal());
        assert!(!Lookup::Lt.accepts_equal());
        assert!(!Lookup::Gt.accepts_equal());
    }
}
