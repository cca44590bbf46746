//! The chunked-series facade.
//!
//! Keys chunks by the affine distance `diff(key, origin)`. The facade
//! keeps two local structures: a chunk index (`chunk_key → chunk
//! version`) installed as a whole snapshot on every refresh, and a chunk
//! cache consulted before any remote read. Writes are lease-scoped
//! write-through: lock, save, cache, refresh.
//!
//! A refresh never mutates the previous index snapshot; cursors taken
//! against it keep observing it until re-created.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use braid_core::{Series, SeriesCursor, SortedMap};
use braid_error::{BraidError, Result};
use braid_types::{AffineComparer, Lookup, SeriesId};
use parking_lot::{Mutex, RwLock};

use crate::store::{ChunkStore, StoreError};

fn remote<T>(op: &'static str, result: std::result::Result<T, StoreError>) -> Result<T> {
    result.map_err(|source| BraidError::remote(op, source))
}

/// A series of chunks backed by a [`ChunkStore`].
///
/// `origin` anchors the affine keying: chunk `ck` holds keys at distance
/// `ck` from it.
pub struct ChunkedSeries<K, V, C, S> {
    store: Arc<S>,
    series_id: SeriesId,
    comparer: C,
    origin: K,
    index: RwLock<Arc<SortedMap<i64, u64>>>,
    cache: Mutex<HashMap<i64, SortedMap<K, V, C>>>,
    remote_version: AtomicU64,
}

impl<K, V, C, S> ChunkedSeries<K, V, C, S>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
    C: AffineComparer<K> + Send + Sync,
    S: ChunkStore<K, V, C>,
{
    /// Open the facade and synchronize the chunk index from the remote.
    pub async fn open(
        store: Arc<S>,
        series_id: SeriesId,
        origin: K,
        comparer: C,
    ) -> Result<Self> {
        let facade = Self {
            store,
            series_id,
            comparer,
            origin,
            index: RwLock::new(Arc::new(SortedMap::with_comparer(
                braid_types::NaturalComparer,
            ))),
            cache: Mutex::new(HashMap::new()),
            remote_version: AtomicU64::new(0),
        };
        facade.refresh_index().await?;
        Ok(facade)
    }

    /// The affine chunk key of a series key.
    #[must_use]
    pub fn chunk_key(&self, key: &K) -> i64 {
        self.comparer.diff(key, &self.origin)
    }

    /// The series key a chunk key stands for.
    #[must_use]
    pub fn key_of_chunk(&self, chunk_key: i64) -> K {
        self.comparer.add(&self.origin, chunk_key)
    }

    /// Last map version reported by the remote.
    #[must_use]
    pub fn remote_version(&self) -> u64 {
        self.remote_version.load(Ordering::Acquire)
    }

    /// The current index snapshot. The handle stays valid (and frozen in
    /// content) across refreshes; re-call to observe newer state.
    #[must_use]
    pub fn index_snapshot(&self) -> SortedMap<i64, u64> {
        (*self.index.read()).as_ref().clone()
    }

    /// Chunk keys currently known locally, in order.
    #[must_use]
    pub fn chunk_keys(&self) -> Vec<i64> {
        self.index_snapshot().iter().map(|(k, _)| k).collect()
    }

    /// Re-sync the local index: fetch changes since the last known map
    /// version and install a fresh snapshot wholesale.
    pub async fn refresh_index(&self) -> Result<()> {
        let since = self.remote_version.load(Ordering::Acquire);
        let listed = remote(
            "load_keys",
            self.store.load_keys(self.series_id, since).await,
        )?;
        // Never mutate the installed snapshot: cursors over it must keep
        // observing it. Build the successor from its entries plus the
        // delta, then swap.
        let next = SortedMap::from_entries(
            braid_types::NaturalComparer,
            self.index_snapshot().entries(),
        )?;
        let mut newest = since;
        for (chunk_key, chunk_version) in listed {
            next.set(chunk_key, chunk_version)?;
            newest = newest.max(chunk_version);
        }
        self.remote_version.store(newest, Ordering::Release);
        *self.index.write() = Arc::new(next);
        tracing::debug!(
            target: "braid.chunks",
            series = %self.series_id,
            since,
            newest,
            "index refreshed"
        );
        Ok(())
    }

    /// Persist a chunk under the exclusive lease, update the cache, and
    /// refresh the index. This is the only write path: a chunk either
    /// lands remotely or the call fails.
    pub async fn add(&self, key: &K, chunk: SortedMap<K, V, C>) -> Result<u64> {
        let chunk_key = self.chunk_key(key);
        let lease = remote(
            "lock_chunk",
            self.store.lock_chunk(self.series_id, chunk_key).await,
        )?;
        let map_version = remote(
            "save_chunk",
            self.store.save_chunk(self.series_id, chunk_key, &chunk).await,
        )?;
        self.cache.lock().insert(chunk_key, chunk);
        drop(lease);
        self.refresh_index().await?;
        Ok(map_version)
    }

    /// Read the chunk covering `key`: cache first, then the remote under
    /// the lease. `None` when the index does not know the chunk.
    pub async fn get(&self, key: &K) -> Result<Option<SortedMap<K, V, C>>> {
        self.get_by_chunk_key(self.chunk_key(key)).await
    }

    async fn get_by_chunk_key(&self, chunk_key: i64) -> Result<Option<SortedMap<K, V, C>>> {
        if let Some(cached) = self.cache.lock().get(&chunk_key) {
            return Ok(Some(cached.clone()));
        }
        if self.index_snapshot().try_get(&chunk_key).is_none() {
            return Ok(None);
        }
        let lease = remote(
            "lock_chunk",
            self.store.lock_chunk(self.series_id, chunk_key).await,
        )?;
        let loaded = remote(
            "load_chunk",
            self.store.load_chunk(self.series_id, chunk_key).await,
        )?;
        drop(lease);
        if let Some(chunk) = loaded {
            self.cache.lock().insert(chunk_key, chunk.clone());
            Ok(Some(chunk))
        } else {
            Ok(None)
        }
    }

    /// The chunk selected by `key` and `lookup` against the local index,
    /// with the series key it is anchored at.
    pub async fn chunk_at(
        &self,
        key: &K,
        lookup: Lookup,
    ) -> Result<Option<(K, SortedMap<K, V, C>)>> {
        let probe = self.chunk_key(key);
        let snapshot = self.index_snapshot();
        let mut cursor = snapshot.cursor();
        if !cursor.move_at(&probe, lookup) {
            return Ok(None);
        }
        let Some(chunk_key) = cursor.key() else {
            return Ok(None);
        };
        match self.get_by_chunk_key(chunk_key).await? {
            Some(chunk) => Ok(Some((self.key_of_chunk(chunk_key), chunk))),
            None => Ok(None),
        }
    }

    /// Remove the half-range of chunks selected by `key` and `lookup`,
    /// remotely and locally.
    pub async fn remove_chunks(&self, key: &K, lookup: Lookup) -> Result<u64> {
        let pivot = self.chunk_key(key);
        let map_version = remote(
            "remove_chunks",
            self.store.remove_chunks(self.series_id, pivot, lookup).await,
        )?;
        self.cache.lock().retain(|chunk_key, _| match lookup {
            Lookup::Eq => *chunk_key != pivot,
            Lookup::Lt => *chunk_key >= pivot,
            Lookup::Le => *chunk_key > pivot,
            Lookup::Gt => *chunk_key <= pivot,
            Lookup::Ge => *chunk_key < pivot,
        });
        // The removal is not represented as a delta by `load_keys`, so
        // rebuild the index snapshot from scratch.
        let listed = remote("load_keys", self.store.load_keys(self.series_id, 0).await)?;
        let next: SortedMap<i64, u64> = SortedMap::with_comparer(braid_types::NaturalComparer);
        for (chunk_key, chunk_version) in listed {
            next.set(chunk_key, chunk_version)?;
        }
        *self.index.write() = Arc::new(next);
        self.remote_version.store(map_version, Ordering::Release);
        Ok(map_version)
    }
}

impl<K, V, C, S> std::fmt::Debug for ChunkedSeries<K, V, C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedSeries")
            .field("series_id", &self.series_id)
            .field("remote_version", &self.remote_version.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryChunkStore;
    use braid_core::task::block_on;
    use braid_types::NaturalComparer;

    type Store = InMemoryChunkStore<i64, i64, NaturalComparer>;

    fn chunk(entries: &[(i64, i64)]) -> SortedMap<i64, i64> {
        SortedMap::from_entries(NaturalComparer, entries.iter().copied()).unwrap()
    }

    fn open(store: &Arc<Store>, id: u128) -> ChunkedSeries<i64, i64, NaturalComparer, Store> {
        block_on(ChunkedSeries::open(
            Arc::clone(store),
            SeriesId::new(id),
            0,
            NaturalComparer,
        ))
        .unwrap()
    }

    #[test]
    fn open_syncs_existing_index() {
        let store = Arc::new(Store::new(NaturalComparer));
        let id = SeriesId::new(1);
        block_on(store.save_chunk(id, 0, &chunk(&[(0, 1)]))).unwrap();
        block_on(store.save_chunk(id, 100, &chunk(&[(100, 2)]))).unwrap();

        let facade = open(&store, 1);
        assert_eq!(facade.chunk_keys(), vec![0, 100]);
        assert_eq!(facade.remote_version(), 2);
    }

    #[test]
    fn add_persists_and_indexes() {
        let store = Arc::new(Store::new(NaturalComparer));
        let facade = open(&store, 2);
        let version = block_on(facade.add(&100, chunk(&[(100, 1), (101, 2)]))).unwrap();
        assert_eq!(version, 1);
        assert_eq!(facade.chunk_keys(), vec![100]);
        assert_eq!(store.chunk_count(SeriesId::new(2)), 1);

        // A second facade over the same store sees the write.
        let other = open(&store, 2);
        let fetched = block_on(other.get(&100)).unwrap().unwrap();
        assert_eq!(fetched.entries(), vec![(100, 1), (101, 2)]);
    }

    #[test]
    fn get_prefers_cache_and_falls_back_to_remote() {
        let store = Arc::new(Store::new(NaturalComparer));
        let facade = open(&store, 3);
        block_on(facade.add(&0, chunk(&[(0, 5)]))).unwrap();

        // Cached: served even while the chunk is leased elsewhere.
        let lease = block_on(store.lock_chunk(SeriesId::new(3), 0)).unwrap();
        let cached = block_on(facade.get(&0)).unwrap().unwrap();
        assert_eq!(cached.try_get(&0), Some(5));
        drop(lease);

        // Cold facade: must go remote (takes the lease itself).
        let cold = open(&store, 3);
        let fetched = block_on(cold.get(&0)).unwrap().unwrap();
        assert_eq!(fetched.try_get(&0), Some(5));
        assert!(block_on(cold.get(&999)).unwrap().is_none());
    }

    #[test]
    fn chunk_at_resolves_directionally() {
        let store = Arc::new(Store::new(NaturalComparer));
        let facade = open(&store, 4);
        block_on(facade.add(&0, chunk(&[(0, 1)]))).unwrap();
        block_on(facade.add(&100, chunk(&[(100, 2)]))).unwrap();

        let (key, _) = block_on(facade.chunk_at(&50, Lookup::Le)).unwrap().unwrap();
        assert_eq!(key, 0);
        let (key, _) = block_on(facade.chunk_at(&50, Lookup::Ge)).unwrap().unwrap();
        assert_eq!(key, 100);
        assert!(block_on(facade.chunk_at(&50, Lookup::Eq)).unwrap().is_none());
    }

    #[test]
    fn remove_chunks_prunes_index_and_cache() {
        let store = Arc::new(Store::new(NaturalComparer));
        let facade = open(&store, 5);
        for key in [0i64, 100, 200] {
            block_on(facade.add(&key, chunk(&[(key, key)]))).unwrap();
        }
        block_on(facade.remove_chunks(&100, Lookup::Ge)).unwrap();
        assert_eq!(facade.chunk_keys(), vec![0]);
        assert_eq!(store.chunk_count(SeriesId::new(5)), 1);
        assert!(block_on(facade.get(&200)).unwrap().is_none());
    }

    #[test]
    fn old_index_snapshot_survives_refresh() {
        let store = Arc::new(Store::new(NaturalComparer));
        let facade = open(&store, 6);
        block_on(facade.add(&0, chunk(&[(0, 1)]))).unwrap();

        let before = facade.index_snapshot();
        let mut cursor = before.cursor();
        assert!(cursor.move_first());

        block_on(facade.add(&100, chunk(&[(100, 1)]))).unwrap();

        // The old snapshot is frozen; the facade sees the new state.
        assert_eq!(before.len(), 1);
        assert!(cursor.move_first());
        assert_eq!(cursor.key(), Some(0));
        assert_eq!(facade.chunk_keys(), vec![0, 100]);
    }

    #[test]
    fn remote_failure_is_wrapped_with_the_hook_name() {
        let store = Arc::new(Store::new(NaturalComparer));
        let facade = open(&store, 7);
        block_on(facade.add(&0, chunk(&[(0, 1)]))).unwrap();

        // Hold the lease so the facade's save path cannot acquire it.
        let lease = block_on(store.lock_chunk(SeriesId::new(7), 0)).unwrap();
        let err = block_on(facade.add(&0, chunk(&[(0, 2)]))).unwrap_err();
        match err {
            BraidError::Remote { op, .. } => assert_eq!(op, "lock_chunk"),
            other => panic!("expected remote failure, got {other}"),
        }
        drop(lease);
    }
}
