//! Completion protocol for live series.
//!
//! A mutable series may keep growing after a consumer has caught up with
//! its tail. Instead of reporting end, an [`AsyncCursor`] registers a
//! one-shot notification request against the source's [`Completer`] and
//! suspends until the next committed write (or completion, or
//! cancellation) wakes it.
//!
//! The wait is a hand-built `std::future::Future`; no runtime is assumed
//! and none is spawned. Wakeups are delivered through `std::task::Waker`,
//! so whichever executor polls the future also runs its continuation.
//!
//! ## Protocol
//!
//! `next_async` polls as: try `move_next`; register; retry `move_next`
//! (closing the lost-wakeup window); check completion; park. A subscriber
//! carries a request count — a writer's notify consumes one request and
//! wakes, a quiesced subscriber (count 0) is skipped unless the notify is
//! forced, which completion uses to release every waiter.
//!
//! ## Metrics
//!
//! Counters: `braid_live_notifies_total`, `braid_live_wakes_total`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use braid_error::{BraidError, Result};
use braid_types::CancelToken;
use parking_lot::Mutex;
use serde::Serialize;
use smallvec::SmallVec;

use crate::cursor::SeriesCursor;

// ---------------------------------------------------------------------------
// Global metrics (lock-free, Relaxed ordering)
// ---------------------------------------------------------------------------

static BRAID_LIVE_NOTIFIES_TOTAL: AtomicU64 = AtomicU64::new(0);
static BRAID_LIVE_WAKES_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Snapshot of completion-protocol metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiveMetrics {
    pub braid_live_notifies_total: u64,
    pub braid_live_wakes_total: u64,
}

/// Read current completion-protocol metrics.
#[must_use]
pub fn live_metrics() -> LiveMetrics {
    LiveMetrics {
        braid_live_notifies_total: BRAID_LIVE_NOTIFIES_TOTAL.load(Ordering::Relaxed),
        braid_live_wakes_total: BRAID_LIVE_WAKES_TOTAL.load(Ordering::Relaxed),
    }
}

// ---------------------------------------------------------------------------
// CompletionSink
// ---------------------------------------------------------------------------

/// Receiver side of a completion subscription.
///
/// `force` overrides request-count quiescence and is set when the source
/// completes; `cancel` tells the sink its wait is void (the source is
/// going away without completing).
pub trait CompletionSink: Send + Sync {
    fn try_complete(&self, force: bool, cancel: bool);
}

// ---------------------------------------------------------------------------
// Completer — per-series subscriber store
// ---------------------------------------------------------------------------

struct SubEntry {
    id: u64,
    sink: Weak<dyn CompletionSink>,
}

/// Per-series completion broadcaster.
///
/// Holds zero, one, or many weak subscribers. The store is inline for the
/// single-subscriber case (the common one), so notify stays O(1) there.
/// Subscribers are weak: a dropped consumer is observed and pruned at the
/// next notify, never leaked.
pub struct Completer {
    subs: Mutex<SmallVec<[SubEntry; 1]>>,
    next_id: AtomicU64,
}

impl Default for Completer {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer {
    /// Create an empty broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subs: Mutex::new(SmallVec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber. Dropping the returned guard unsubscribes.
    pub fn subscribe(completer: &Arc<Self>, sink: Weak<dyn CompletionSink>) -> Subscription {
        let id = completer.next_id.fetch_add(1, Ordering::Relaxed);
        completer.subs.lock().push(SubEntry { id, sink });
        Subscription {
            completer: Arc::downgrade(completer),
            id,
        }
    }

    /// Number of live subscribers (diagnostics).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subs.lock().len()
    }

    /// Wake subscribers after a committed write (`force = false`) or on
    /// completion (`force = true`).
    ///
    /// Sinks are invoked outside the store lock so a sink that drops its
    /// own subscription cannot deadlock against us.
    pub fn notify(&self, force: bool) {
        BRAID_LIVE_NOTIFIES_TOTAL.fetch_add(1, Ordering::Relaxed);
        let targets: SmallVec<[Arc<dyn CompletionSink>; 1]> = {
            let mut subs = self.subs.lock();
            subs.retain(|entry| entry.sink.strong_count() > 0);
            subs.iter().filter_map(|entry| entry.sink.upgrade()).collect()
        };
        if targets.is_empty() {
            return;
        }
        tracing::trace!(target: "braid.live", subscribers = targets.len(), force, "notify");
        for sink in targets {
            sink.try_complete(force, false);
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.subs.lock().retain(|entry| entry.id != id);
    }
}

impl std::fmt::Debug for Completer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completer")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

/// Subscription guard returned by [`Completer::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    completer: Weak<Completer>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(completer) = self.completer.upgrade() {
            completer.unsubscribe(self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Wait state — the async cursor's sink
// ---------------------------------------------------------------------------

struct WaitState {
    /// Outstanding notification requests. A parked waiter holds 1; a
    /// notify consumes it. 0 means quiesced: non-forced notifies are
    /// coalesced away.
    requests: AtomicU64,
    waker: Mutex<Option<Waker>>,
}

impl WaitState {
    fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            waker: Mutex::new(None),
        }
    }

    fn arm(&self, waker: &Waker) {
        *self.waker.lock() = Some(waker.clone());
        self.requests.store(1, Ordering::Release);
    }

    fn disarm(&self) {
        self.requests.store(0, Ordering::Release);
        *self.waker.lock() = None;
    }
}

impl CompletionSink for WaitState {
    fn try_complete(&self, force: bool, cancel: bool) {
        if force || cancel {
            self.requests.store(0, Ordering::Release);
        } else {
            let consumed = self
                .requests
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok();
            if !consumed {
                return; // quiesced: coalesce
            }
        }
        if let Some(waker) = self.waker.lock().take() {
            BRAID_LIVE_WAKES_TOTAL.fetch_add(1, Ordering::Relaxed);
            waker.wake();
        }
    }
}

// ---------------------------------------------------------------------------
// AsyncCursor
// ---------------------------------------------------------------------------

/// Wraps a cursor whose source supports subscription, turning the tail of
/// the series into an awaitable stream of entries.
pub struct AsyncCursor<C: SeriesCursor> {
    cursor: C,
    wait: Arc<WaitState>,
    subscription: Option<Subscription>,
}

impl<C: SeriesCursor> AsyncCursor<C> {
    /// Wrap `cursor`. The subscription against the source is established
    /// lazily, on the first wait that actually has to park.
    pub fn new(cursor: C) -> Self {
        Self {
            cursor,
            wait: Arc::new(WaitState::new()),
            subscription: None,
        }
    }

    /// The wrapped cursor.
    pub fn cursor(&self) -> &C {
        &self.cursor
    }

    /// Unwrap, dropping the subscription.
    pub fn into_inner(self) -> C {
        self.cursor
    }

    /// Await the next entry.
    ///
    /// Resolves `Ok(Some(entry))` when the cursor advances, `Ok(None)`
    /// when the source is completed and fully consumed, and
    /// `Err(BraidError::Cancelled)` when `token` fires first.
    pub fn next_async<'a>(&'a mut self, token: &'a CancelToken) -> NextFuture<'a, C> {
        NextFuture { owner: self, token }
    }

    fn take_entry(&mut self) -> Result<Option<(C::Key, C::Value)>> {
        self.wait.disarm();
        match self.cursor.entry() {
            Some(entry) => Ok(Some(entry)),
            None => Err(BraidError::invariant(
                "cursor advanced but has no current entry",
            )),
        }
    }
}

impl<C: SeriesCursor + std::fmt::Debug> std::fmt::Debug for AsyncCursor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncCursor")
            .field("cursor", &self.cursor)
            .field("subscribed", &self.subscription.is_some())
            .finish_non_exhaustive()
    }
}

/// Future returned by [`AsyncCursor::next_async`].
pub struct NextFuture<'a, C: SeriesCursor> {
    owner: &'a mut AsyncCursor<C>,
    token: &'a CancelToken,
}

impl<C: SeriesCursor> Future for NextFuture<'_, C> {
    type Output = Result<Option<(C::Key, C::Value)>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let owner = &mut *this.owner;

        // Cancellation wins over data.
        if this.token.is_cancelled() {
            owner.wait.disarm();
            return Poll::Ready(Err(BraidError::Cancelled));
        }

        // Fast path: data is already there.
        if owner.cursor.move_next() {
            return Poll::Ready(owner.take_entry());
        }

        // Subscribe on first park. A source without a completer cannot
        // grow behind our back, so its end is final.
        if owner.subscription.is_none() {
            match owner.cursor.completer() {
                Some(completer) => {
                    let wait_dyn: Arc<dyn CompletionSink> = owner.wait.clone();
                    let sink: Weak<dyn CompletionSink> = Arc::downgrade(&wait_dyn);
                    owner.subscription = Some(Completer::subscribe(&completer, sink));
                }
                None => return Poll::Ready(Ok(None)),
            }
        }

        // Register, then retry once: an update that landed between the
        // first attempt and registration must not be lost.
        owner.wait.arm(cx.waker());
        if owner.cursor.move_next() {
            return Poll::Ready(owner.take_entry());
        }

        if owner.cursor.source_completed() {
            owner.wait.disarm();
            return Poll::Ready(Ok(None));
        }

        this.token.register_waker(cx.waker());
        Poll::Pending
    }
}
