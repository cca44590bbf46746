//! Version gate for the optimistic read/write discipline.
//!
//! Every mutable series owns a [`VersionGate`]: a published `version`, a
//! pre-publish `next_version`, and a single-writer latch. Writers acquire
//! the latch, bump `next_version`, mutate, and either publish
//! (`version = next_version`) or roll back when the mutation turned out to
//! be a no-op. Readers never block writers; a reader composing several
//! field reads samples `version` before and `next_version` after, and
//! retries when they differ.
//!
//! ## Tracing & metrics
//!
//! - DEBUG log when a consistent read needed retries.
//! - Counters: `braid_gate_reads_total`, `braid_gate_retries_total`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// ---------------------------------------------------------------------------
// Global metrics (lock-free, Relaxed ordering)
// ---------------------------------------------------------------------------

static BRAID_GATE_READS_TOTAL: AtomicU64 = AtomicU64::new(0);
static BRAID_GATE_RETRIES_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Snapshot of version-gate metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateMetrics {
    pub braid_gate_reads_total: u64,
    pub braid_gate_retries_total: u64,
}

/// Read current version-gate metrics.
#[must_use]
pub fn gate_metrics() -> GateMetrics {
    GateMetrics {
        braid_gate_reads_total: BRAID_GATE_READS_TOTAL.load(Ordering::Relaxed),
        braid_gate_retries_total: BRAID_GATE_RETRIES_TOTAL.load(Ordering::Relaxed),
    }
}

// ---------------------------------------------------------------------------
// VersionGate
// ---------------------------------------------------------------------------

/// Maximum retries before a consistent read gives up.
const MAX_RETRIES: u32 = 1_000_000;

/// Published/pre-publish version pair with a single-writer latch.
///
/// Writers call [`begin_write`](VersionGate::begin_write) and commit or
/// drop the returned ticket. Readers call
/// [`read_consistent`](VersionGate::read_consistent) for an optimistic,
/// non-blocking multi-field snapshot, or sample
/// [`version`](VersionGate::version) directly for change detection.
pub struct VersionGate {
    version: AtomicU64,
    next_version: AtomicU64,
    write_lock: parking_lot::Mutex<()>,
}

impl VersionGate {
    /// Create a gate with the given initial published version.
    #[must_use]
    pub fn new(initial: u64) -> Self {
        Self {
            version: AtomicU64::new(initial),
            next_version: AtomicU64::new(initial),
            write_lock: parking_lot::Mutex::new(()),
        }
    }

    /// Currently published version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Pre-publish counter; differs from `version` only while a writer is
    /// between bump and publish.
    #[must_use]
    pub fn next_version(&self) -> u64 {
        self.next_version.load(Ordering::Acquire)
    }

    /// Acquire the write latch and bump `next_version`.
    ///
    /// The returned ticket publishes on [`WriteTicket::commit`]; dropping
    /// it without committing rolls `next_version` back so readers do not
    /// spin on a version that will never be published.
    pub fn begin_write(&self) -> WriteTicket<'_> {
        let guard = self.write_lock.lock();
        let next = self.version.load(Ordering::Acquire) + 1;
        self.next_version.store(next, Ordering::Release);
        WriteTicket {
            gate: self,
            _guard: guard,
            next,
            committed: false,
        }
    }

    /// Optimistic consistent read. Runs `f` until a pass completes with no
    /// concurrent write observed. Returns `None` only when `MAX_RETRIES`
    /// is exhausted, which indicates a stuck writer and is treated as an
    /// invariant violation by callers.
    #[inline]
    pub fn read_consistent<R>(&self, label: &str, mut f: impl FnMut() -> R) -> Option<R> {
        let mut retries: u32 = 0;
        loop {
            let before = self.version.load(Ordering::Acquire);
            let result = f();
            let after = self.next_version.load(Ordering::Acquire);
            if before == after {
                BRAID_GATE_READS_TOTAL.fetch_add(1, Ordering::Relaxed);
                if retries > 0 {
                    BRAID_GATE_RETRIES_TOTAL.fetch_add(u64::from(retries), Ordering::Relaxed);
                    tracing::debug!(target: "braid.gate", label, retries, "consistent read contended");
                }
                return Some(result);
            }
            retries += 1;
            if retries >= MAX_RETRIES {
                tracing::debug!(target: "braid.gate", label, retries, "consistent read gave up");
                return None;
            }
            std::hint::spin_loop();
        }
    }
}

impl std::fmt::Debug for VersionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version = self.version.load(Ordering::Relaxed);
        let next = self.next_version.load(Ordering::Relaxed);
        f.debug_struct("VersionGate")
            .field("version", &version)
            .field("writing", &(next != version))
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// WriteTicket
// ---------------------------------------------------------------------------

/// Exclusive write ticket: latch held, `next_version` bumped.
pub struct WriteTicket<'a> {
    gate: &'a VersionGate,
    _guard: parking_lot::MutexGuard<'a, ()>,
    next: u64,
    committed: bool,
}

impl WriteTicket<'_> {
    /// The version this write will publish as.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.next
    }

    /// Publish `version = next_version`. Content changed.
    pub fn commit(mut self) {
        self.committed = true;
        self.gate.version.store(self.next, Ordering::Release);
    }
}

impl Drop for WriteTicket<'_> {
    fn drop(&mut self) {
        if !self.committed {
            // No content change: roll back so readers stop retrying.
            let published = self.gate.version.load(Ordering::Acquire);
            self.gate.next_version.store(published, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn commit_publishes() {
        let gate = VersionGate::new(0);
        let ticket = gate.begin_write();
        assert_eq!(ticket.version(), 1);
        assert_eq!(gate.version(), 0);
        assert_eq!(gate.next_version(), 1);
        ticket.commit();
        assert_eq!(gate.version(), 1);
        assert_eq!(gate.next_version(), 1);
    }

    #[test]
    fn drop_without_commit_rolls_back() {
        let gate = VersionGate::new(5);
        {
            let _ticket = gate.begin_write();
            assert_eq!(gate.next_version(), 6);
        }
        assert_eq!(gate.version(), 5);
        assert_eq!(gate.next_version(), 5);
    }

    #[test]
    fn read_consistent_plain() {
        let gate = VersionGate::new(0);
        let value = gate.read_consistent("test", || 42);
        assert_eq!(value, Some(42));
    }

    #[test]
    fn sequential_writes_are_monotonic() {
        let gate = VersionGate::new(0);
        for expected in 1..=10 {
            gate.begin_write().commit();
            assert_eq!(gate.version(), expected);
        }
    }

    /// Concurrent readers never observe a pair torn across a write.
    #[test]
    fn no_torn_reads_under_contention() {
        let gate = Arc::new(VersionGate::new(0));
        let shared = Arc::new((AtomicU64::new(0), AtomicU64::new(0)));
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let barrier = Arc::new(Barrier::new(5));

        let writer_gate = Arc::clone(&gate);
        let writer_shared = Arc::clone(&shared);
        let writer_stop = Arc::clone(&stop);
        let writer_barrier = Arc::clone(&barrier);
        let writer = thread::spawn(move || {
            writer_barrier.wait();
            let mut val = 0u64;
            while !writer_stop.load(Ordering::Relaxed) {
                val += 1;
                let ticket = writer_gate.begin_write();
                writer_shared.0.store(val, Ordering::Release);
                writer_shared.1.store(val, Ordering::Release);
                ticket.commit();
            }
            val
        });

        let mut readers = Vec::new();
        for _ in 0..4 {
            let g = Arc::clone(&gate);
            let s = Arc::clone(&shared);
            let st = Arc::clone(&stop);
            let b = Arc::clone(&barrier);
            readers.push(thread::spawn(move || {
                b.wait();
                let mut reads = 0u64;
                while !st.load(Ordering::Relaxed) {
                    if let Some((a, b)) = g.read_consistent("pair", || {
                        (s.0.load(Ordering::Acquire), s.1.load(Ordering::Acquire))
                    }) {
                        assert_eq!(a, b, "torn read: a={a}, b={b}");
                        reads += 1;
                    }
                }
                reads
            }));
        }

        thread::sleep(Duration::from_millis(300));
        stop.store(true, Ordering::Release);

        let writes = writer.join().unwrap();
        let total_reads: u64 = readers.into_iter().map(|r| r.join().unwrap()).sum();
        assert!(writes > 0, "writer must have written");
        assert!(total_reads > 0, "readers must have read");
    }

    #[test]
    fn metrics_increment() {
        let before = gate_metrics();
        let gate = VersionGate::new(0);
        gate.read_consistent("m1", || ());
        gate.read_consistent("m2", || ());
        let after = gate_metrics();
        assert!(after.braid_gate_reads_total - before.braid_gate_reads_total >= 2);
    }

    #[test]
    fn debug_format() {
        let gate = VersionGate::new(3);
        let rendered = format!("{gate:?}");
        assert!(rendered.contains("VersionGate"));
        assert!(rendered.contains("writing: false"));
    }
}
