use thiserror::Error;

/// Boxed cause attached to remote-hook failures.
pub type RemoteCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Primary error type for braid operations.
///
/// Structured variants for the conditions a caller can act on; the
/// `try_*` container entry points report expected misses as `false`/`None`
/// results instead and reserve these variants for the unconditional forms.
#[derive(Error, Debug)]
pub enum BraidError {
    // === Lookup / mutation errors ===
    /// Point lookup on a key that is not present.
    #[error("key not found in series")]
    KeyNotFound,

    /// Unconditional `add` of a key that is already present.
    #[error("key already exists in series")]
    Duplicate,

    /// Endpoint insert that does not extend the series monotonically.
    #[error("key is out of order for an endpoint insert")]
    OutOfOrder,

    /// Series has grown past its capacity ceiling.
    #[error("series capacity exceeded (max {max} entries)")]
    CapacityExceeded { max: usize },

    // === Lifecycle errors ===
    /// Mutation against a series whose `complete()` has been called.
    #[error("series is completed; no further mutations are accepted")]
    Completed,

    /// An async wait was cancelled through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    // === Composition errors ===
    /// `try_append` overlap policy rejected the incoming series.
    #[error("append overlap violation: {detail}")]
    OverlapViolation { detail: String },

    /// Zip construction over two series with disagreeing comparers.
    #[error("zip requires both sides to order keys with the same comparer")]
    ComparerMismatch,

    // === Remote errors ===
    /// A remote chunk hook failed; the underlying cause is attached.
    #[error("remote chunk operation `{op}` failed")]
    Remote {
        op: &'static str,
        #[source]
        source: RemoteCause,
    },

    // === Internal errors ===
    /// Internal contract broken. The version/latch invariants cannot be
    /// rebuilt once this is observed, so callers must treat it as fatal.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl BraidError {
    /// Create an overlap violation with a formatted detail message.
    pub fn overlap(detail: impl Into<String>) -> Self {
        Self::OverlapViolation {
            detail: detail.into(),
        }
    }

    /// Create a remote failure wrapping the hook's underlying cause.
    pub fn remote(op: &'static str, source: impl Into<RemoteCause>) -> Self {
        Self::Remote {
            op,
            source: source.into(),
        }
    }

    /// Create an invariant-violation error.
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Whether the error is terminal for the series: no retry or
    /// alternative call on the same handle can succeed afterwards.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Invariant(_))
    }

    /// Whether retrying the same operation may succeed.
    ///
    /// Only remote failures qualify; everything else is deterministic.
    /// Optimistic version conflicts are retried internally and never
    /// surface here.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

/// Result type alias using `BraidError`.
pub type Result<T> = std::result::Result<T, BraidError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings() {
        assert_eq!(BraidError::KeyNotFound.to_string(), "key not found in series");
        assert_eq!(
            BraidError::Completed.to_string(),
            "series is completed; no further mutations are accepted"
        );
        assert_eq!(
            BraidError::overlap("other.first=2 <= self.last=3").to_string(),
            "append overlap violation: other.first=2 <= self.last=3"
        );
        assert_eq!(
            BraidError::CapacityExceeded { max: 8 }.to_string(),
            "series capacity exceeded (max 8 entries)"
        );
    }

    #[test]
    fn remote_preserves_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::TimedOut, "lease timed out");
        let err = BraidError::remote("lock_chunk", cause);
        assert_eq!(err.to_string(), "remote chunk operation `lock_chunk` failed");
        let source = std::error::Error::source(&err).expect("cause must be attached");
        assert!(source.to_string().contains("lease timed out"));
    }

    #[test]
    fn terminal_classification() {
        assert!(BraidError::Completed.is_terminal());
        assert!(BraidError::invariant("latch state lost").is_terminal());
        assert!(!BraidError::Duplicate.is_terminal());
        assert!(!BraidError::Cancelled.is_terminal());
    }

    #[test]
    fn transient_classification() {
        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(BraidError::remote("load_chunk", cause).is_transient());
        assert!(!BraidError::KeyNotFound.is_transient());
        assert!(!BraidError::Completed.is_transient());
    }

    #[test]
    fn invariant_constructor() {
        let err = BraidError::invariant("lookup produced an impossible miss code");
        assert!(matches!(err, BraidError::Invariant(msg)
            if msg == "lookup produced an impossible miss code"));
    }
}
