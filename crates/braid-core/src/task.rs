//! Minimal future driving, for hosts without an async runtime.
//!
//! braid's futures are runtime-agnostic; any executor can poll them. For
//! tests, examples, and plain synchronous callers, [`block_on`] drives a
//! single future on the current thread using park/unpark.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Wake, Waker};
use std::thread::Thread;

struct ThreadWaker(Thread);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

/// Run a future to completion on the current thread.
///
/// Parks between polls; any waker delivery (a series notify, a
/// cancellation) unparks and re-polls.
pub fn block_on<F: Future>(fut: F) -> F::Output {
    let mut fut = pin!(fut);
    let waker = Waker::from(Arc::new(ThreadWaker(std::thread::current())));
    let mut cx = Context::from_waker(&waker);
    loop {
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(out) => return out,
            Poll::Pending => std::thread::park(),
        }
    }
}

/// A waker that does nothing. Useful for single-shot polls in tests.
#[must_use]
pub fn noop_waker() -> Waker {
    fn raw() -> RawWaker {
        RawWaker::new(std::ptr::null(), &VTABLE)
    }
    static VTABLE: RawWakerVTable =
        RawWakerVTable::new(|_| raw(), |_| {}, |_| {}, |_| {});
    // SAFETY: every vtable entry is a no-op over a null pointer.
    unsafe { Waker::from_raw(raw()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_on_ready_future() {
        assert_eq!(block_on(async { 41 + 1 }), 42);
    }

    #[test]
    fn block_on_crosses_threads() {
        use std::future::poll_fn;
        use std::sync::atomic::{AtomicBool, Ordering};

        let flag = Arc::new(AtomicBool::new(false));
        let waker_slot: Arc<parking_lot::Mutex<Option<Waker>>> =
            Arc::new(parking_lot::Mutex::new(None));

        let f = Arc::clone(&flag);
        let w = Arc::clone(&waker_slot);
        let setter = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            f.store(true, Ordering::Release);
            if let Some(waker) = w.lock().take() {
                waker.wake();
            }
        });

        let done = block_on(poll_fn(|cx| {
            if flag.load(Ordering::Acquire) {
                Poll::Ready(true)
            } else {
                *waker_slot.lock() = Some(cx.waker().clone());
                Poll::Pending
            }
        }));
        assert!(done);
        setter.join().unwrap();
    }
}
