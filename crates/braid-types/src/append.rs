//! Append overlap policy.

/// How `try_append` treats overlap between the incoming series and the
/// tail of the receiver. The overlap test is `other.first <= self.last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppendMode {
    /// Fail with an overlap violation when any overlap exists.
    RejectOnOverlap,
    /// Drop the receiver's keys at or after `other.first`, then append
    /// everything from `other`.
    DropOldOverlap,
    /// Require the overlapping range to be element-wise equal on both
    /// sides, then append only the strictly-newer suffix.
    IgnoreEqualOverlap,
    /// Like `IgnoreEqualOverlap`, but fail when there is no overlap at
    /// all. Used when the caller relies on the splice point existing.
    RequireEqualOverlap,
}

impl AppendMode {
    /// Whether this mode demands an element-wise-equal overlap check.
    #[must_use]
    pub const fn checks_equality(self) -> bool {
        matches!(self, Self::IgnoreEqualOverlap | Self::RequireEqualOverlap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_checking_modes() {
        assert!(AppendMode::IgnoreEqualOverlap.checks_equality());
        assert!(AppendMode::RequireEqualOverlap.checks_equality());
        assert!(!AppendMode::RejectOnOverlap.checks_equality());
        assert!(!AppendMode::DropOldOverlap.checks_equality());
    }
}
