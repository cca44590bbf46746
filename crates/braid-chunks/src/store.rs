//! Remote chunk hooks.
//!
//! The trait is runtime-agnostic and uses `async_trait`; apps implement
//! it over whatever transport they have. Every hook can fail with an
//! opaque [`StoreError`]; the facade wraps failures with the operation
//! name so callers see which hook broke.

use async_trait::async_trait;
use braid_core::SortedMap;
use braid_types::{Lookup, SeriesId};

/// Opaque cause carried by failing hooks.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for hook implementations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Scoped exclusive handle on one remote chunk.
///
/// Releases on drop, on every exit path. Implementations pass a release
/// closure; it runs exactly once.
pub struct ChunkLease {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ChunkLease {
    /// Build a lease from its release action.
    #[must_use]
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for ChunkLease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for ChunkLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkLease")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// The five pluggable remote hooks behind a [`ChunkedSeries`](crate::ChunkedSeries).
///
/// `series` is an opaque 128-bit identifier; `chunk_key` is the affine
/// distance of the chunk's first key from the series origin. Chunk
/// versions and the map version are monotone counters owned by the store.
#[async_trait]
pub trait ChunkStore<K, V, C>: Send + Sync
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
    C: Send + Sync,
{
    /// Load the chunk index: every `(chunk_key, chunk_version)` whose
    /// version is newer than `since_version` (0 lists everything).
    async fn load_keys(
        &self,
        series: SeriesId,
        since_version: u64,
    ) -> StoreResult<Vec<(i64, u64)>>;

    /// Load one chunk, or `None` when the store does not have it.
    async fn load_chunk(
        &self,
        series: SeriesId,
        chunk_key: i64,
    ) -> StoreResult<Option<SortedMap<K, V, C>>>;

    /// Persist one chunk; returns the new map version.
    async fn save_chunk(
        &self,
        series: SeriesId,
        chunk_key: i64,
        chunk: &SortedMap<K, V, C>,
    ) -> StoreResult<u64>;

    /// Remove the half-range of chunks selected by `chunk_key` and
    /// `lookup`; returns the new map version.
    async fn remove_chunks(
        &self,
        series: SeriesId,
        chunk_key: i64,
        lookup: Lookup,
    ) -> StoreResult<u64>;

    /// Acquire the exclusive lease on one chunk.
    async fn lock_chunk(&self, series: SeriesId, chunk_key: i64) -> StoreResult<ChunkLease>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn lease_releases_on_drop() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);
        let lease = ChunkLease::new(move || flag.store(true, Ordering::SeqCst));
        assert!(!released.load(Ordering::SeqCst));
        drop(lease);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn lease_releases_on_panic_path() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);
        let outcome = std::panic::catch_unwind(move || {
            let _lease = ChunkLease::new(move || flag.store(true, Ordering::SeqCst));
            panic!("simulated failure while holding the lease");
        });
        assert!(outcome.is_err());
        assert!(released.load(Ordering::SeqCst));
    }
}
