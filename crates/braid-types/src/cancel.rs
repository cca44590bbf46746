//! Cancellation token for async waits.
//!
//! Cancellation is modelled as an external token, not an exception: the
//! caller hands a [`CancelToken`] to every async wait, and cancelling the
//! token promptly resolves those waits with a cancelled error.
//!
//! The token carries a monotone reason: multiple cancel requests keep the
//! strongest reason and can never weaken it. Pending futures register
//! their wakers with the token so that `cancel()` wakes them without any
//! polling loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Waker;

use braid_error::{BraidError, Result};
use parking_lot::Mutex;

/// Reason for cancellation, ordered from weakest to strongest.
///
/// Repeated cancels are monotone: the strongest reason wins and the
/// recorded reason never gets weaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CancelReason {
    Timeout = 0,
    UserInterrupt = 1,
    Shutdown = 2,
}

#[derive(Debug)]
struct TokenInner {
    cancelled: AtomicBool,
    reason: Mutex<Option<CancelReason>>,
    wakers: Mutex<Vec<Waker>>,
}

/// Shared cancellation flag with waker delivery.
///
/// Clones share state: cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                reason: Mutex::new(None),
                wakers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation with the default reason (`UserInterrupt`).
    pub fn cancel(&self) {
        self.cancel_with_reason(CancelReason::UserInterrupt);
    }

    /// Request cancellation with an explicit reason and wake every
    /// registered waiter.
    pub fn cancel_with_reason(&self, reason: CancelReason) {
        self.inner.cancelled.store(true, Ordering::Release);
        {
            let mut slot = self.inner.reason.lock();
            match *slot {
                Some(existing) if existing >= reason => {}
                _ => *slot = Some(reason),
            }
        }
        let wakers = std::mem::take(&mut *self.inner.wakers.lock());
        for waker in wakers {
            waker.wake();
        }
    }

    /// The strongest reason recorded so far, if any.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        *self.inner.reason.lock()
    }

    /// Check for cancellation at a yield point.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(BraidError::Cancelled);
        }
        Ok(())
    }

    /// Register a waker to be woken on cancellation.
    ///
    /// If the token is already cancelled the waker fires immediately.
    /// Re-registering the waker of an already-registered task is a no-op,
    /// so repeated polls do not grow the registry.
    pub fn register_waker(&self, waker: &Waker) {
        if self.is_cancelled() {
            waker.wake_by_ref();
            return;
        }
        let mut wakers = self.inner.wakers.lock();
        if !wakers.iter().any(|w| w.will_wake(waker)) {
            wakers.push(waker.clone());
        }
        drop(wakers);
        // A cancel may have raced the registration; make sure the waker
        // cannot be lost.
        if self.is_cancelled() {
            let pending = std::mem::take(&mut *self.inner.wakers.lock());
            for w in pending {
                w.wake();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::task::Wake;

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn wake_by_ref(self: &Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_waker() -> (Arc<CountingWaker>, Waker) {
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(Arc::clone(&counter));
        (counter, waker)
    }

    #[test]
    fn checkpoint_observes_cancellation() {
        let token = CancelToken::new();
        assert!(token.checkpoint().is_ok());
        token.cancel();
        assert!(matches!(token.checkpoint(), Err(BraidError::Cancelled)));
    }

    #[test]
    fn clones_share_state() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn strongest_reason_wins() {
        let token = CancelToken::new();
        token.cancel_with_reason(CancelReason::Timeout);
        assert_eq!(token.reason(), Some(CancelReason::Timeout));
        token.cancel_with_reason(CancelReason::Shutdown);
        assert_eq!(token.reason(), Some(CancelReason::Shutdown));
        token.cancel_with_reason(CancelReason::UserInterrupt);
        assert_eq!(token.reason(), Some(CancelReason::Shutdown));
    }

    #[test]
    fn cancel_wakes_registered_waker() {
        let (counter, waker) = counting_waker();
        let token = CancelToken::new();
        token.register_waker(&waker);
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        token.cancel();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn register_after_cancel_wakes_immediately() {
        let (counter, waker) = counting_waker();
        let token = CancelToken::new();
        token.cancel();
        token.register_waker(&waker);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reregistration_does_not_duplicate() {
        let (counter, waker) = counting_waker();
        let token = CancelToken::new();
        token.register_waker(&waker);
        token.register_waker(&waker);
        token.cancel();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
