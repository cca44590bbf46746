//! In-memory chunk store.
//!
//! Reference implementation of the hooks, used by the facade tests and
//! exported for downstream test suites. Chunks are stored as owned entry
//! vectors; loading rebuilds a fresh map, so a loaded chunk never aliases
//! store state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use braid_core::SortedMap;
use braid_types::{KeyComparer, Lookup, SeriesId};
use parking_lot::Mutex;

use crate::store::{ChunkLease, ChunkStore, StoreResult};

struct StoredChunk<K, V> {
    version: u64,
    entries: Vec<(K, V)>,
}

struct StoredSeries<K, V> {
    map_version: u64,
    chunks: BTreeMap<i64, StoredChunk<K, V>>,
}

impl<K, V> Default for StoredSeries<K, V> {
    fn default() -> Self {
        Self {
            map_version: 0,
            chunks: BTreeMap::new(),
        }
    }
}

/// Hook implementation backed by process memory.
pub struct InMemoryChunkStore<K, V, C> {
    comparer: C,
    state: Mutex<HashMap<SeriesId, StoredSeries<K, V>>>,
    leases: Arc<Mutex<HashSet<(SeriesId, i64)>>>,
}

impl<K, V, C: Clone> InMemoryChunkStore<K, V, C> {
    /// Empty store; chunks will be rebuilt with `comparer` on load.
    #[must_use]
    pub fn new(comparer: C) -> Self {
        Self {
            comparer,
            state: Mutex::new(HashMap::new()),
            leases: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Number of chunks currently held for a series.
    #[must_use]
    pub fn chunk_count(&self, series: SeriesId) -> usize {
        self.state
            .lock()
            .get(&series)
            .map_or(0, |s| s.chunks.len())
    }
}

impl<K, V, C> std::fmt::Debug for InMemoryChunkStore<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryChunkStore")
            .field("series", &self.state.lock().len())
            .finish_non_exhaustive()
    }
}

fn in_half_range(chunk_key: i64, pivot: i64, lookup: Lookup) -> bool {
    match lookup {
        Lookup::Eq => chunk_key == pivot,
        Lookup::Lt => chunk_key < pivot,
        Lookup::Le => chunk_key <= pivot,
        Lookup::Gt => chunk_key > pivot,
        Lookup::Ge => chunk_key >= pivot,
    }
}

#[async_trait]
impl<K, V, C> ChunkStore<K, V, C> for InMemoryChunkStore<K, V, C>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
    C: KeyComparer<K> + Send + Sync,
{
    async fn load_keys(
        &self,
        series: SeriesId,
        since_version: u64,
    ) -> StoreResult<Vec<(i64, u64)>> {
        let state = self.state.lock();
        let Some(stored) = state.get(&series) else {
            return Ok(Vec::new());
        };
        Ok(stored
            .chunks
            .iter()
            .filter(|(_, chunk)| chunk.version > since_version)
            .map(|(key, chunk)| (*key, chunk.version))
            .collect())
    }

    async fn load_chunk(
        &self,
        series: SeriesId,
        chunk_key: i64,
    ) -> StoreResult<Option<SortedMap<K, V, C>>> {
        let entries = {
            let state = self.state.lock();
            state
                .get(&series)
                .and_then(|stored| stored.chunks.get(&chunk_key))
                .map(|chunk| chunk.entries.clone())
        };
        let Some(entries) = entries else {
            return Ok(None);
        };
        let map = SortedMap::from_entries(self.comparer.clone(), entries)
            .map_err(|err| -> crate::store::StoreError { Box::new(err) })?;
        Ok(Some(map))
    }

    async fn save_chunk(
        &self,
        series: SeriesId,
        chunk_key: i64,
        chunk: &SortedMap<K, V, C>,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock();
        let stored = state.entry(series).or_default();
        stored.map_version += 1;
        let version = stored.map_version;
        stored.chunks.insert(
            chunk_key,
            StoredChunk {
                version,
                entries: chunk.entries(),
            },
        );
        tracing::debug!(target: "braid.chunks", %series, chunk_key, version, "chunk saved");
        Ok(version)
    }

    async fn remove_chunks(
        &self,
        series: SeriesId,
        chunk_key: i64,
        lookup: Lookup,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock();
        let stored = state.entry(series).or_default();
        let before = stored.chunks.len();
        stored
            .chunks
            .retain(|key, _| !in_half_range(*key, chunk_key, lookup));
        if stored.chunks.len() != before {
            stored.map_version += 1;
        }
        Ok(stored.map_version)
    }

    async fn lock_chunk(&self, series: SeriesId, chunk_key: i64) -> StoreResult<ChunkLease> {
        {
            let mut leases = self.leases.lock();
            if !leases.insert((series, chunk_key)) {
                return Err(format!("chunk {chunk_key} of {series} is already leased").into());
            }
        }
        let registry = Arc::clone(&self.leases);
        Ok(ChunkLease::new(move || {
            registry.lock().remove(&(series, chunk_key));
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::task::block_on;
    use braid_types::NaturalComparer;

    fn store() -> InMemoryChunkStore<i64, i64, NaturalComparer> {
        InMemoryChunkStore::new(NaturalComparer)
    }

    fn chunk(entries: &[(i64, i64)]) -> SortedMap<i64, i64> {
        SortedMap::from_entries(NaturalComparer, entries.iter().copied()).unwrap()
    }

    #[test]
    fn save_load_round_trip() {
        let store = store();
        let id = SeriesId::new(1);
        let version = block_on(store.save_chunk(id, 0, &chunk(&[(1, 10), (2, 20)]))).unwrap();
        assert_eq!(version, 1);
        let loaded = block_on(store.load_chunk(id, 0)).unwrap().unwrap();
        assert_eq!(loaded.entries(), vec![(1, 10), (2, 20)]);
        assert!(block_on(store.load_chunk(id, 99)).unwrap().is_none());
    }

    #[test]
    fn load_keys_filters_by_version() {
        let store = store();
        let id = SeriesId::new(2);
        block_on(store.save_chunk(id, 0, &chunk(&[(1, 1)]))).unwrap();
        block_on(store.save_chunk(id, 100, &chunk(&[(101, 1)]))).unwrap();
        let all = block_on(store.load_keys(id, 0)).unwrap();
        assert_eq!(all, vec![(0, 1), (100, 2)]);
        let newer = block_on(store.load_keys(id, 1)).unwrap();
        assert_eq!(newer, vec![(100, 2)]);
    }

    #[test]
    fn remove_chunks_half_range() {
        let store = store();
        let id = SeriesId::new(3);
        for key in [0i64, 100, 200, 300] {
            block_on(store.save_chunk(id, key, &chunk(&[(key, key)]))).unwrap();
        }
        let version = block_on(store.remove_chunks(id, 200, Lookup::Ge)).unwrap();
        assert_eq!(version, 5);
        assert_eq!(store.chunk_count(id), 2);
        // Removing an empty half-range leaves the version alone.
        let version = block_on(store.remove_chunks(id, 1000, Lookup::Ge)).unwrap();
        assert_eq!(version, 5);
    }

    #[test]
    fn lease_is_exclusive_until_released() {
        let store = store();
        let id = SeriesId::new(4);
        let lease = block_on(store.lock_chunk(id, 7)).unwrap();
        assert!(block_on(store.lock_chunk(id, 7)).is_err());
        assert!(block_on(store.lock_chunk(id, 8)).is_ok());
        drop(lease);
        assert!(block_on(store.lock_chunk(id, 7)).is_ok());
    }

    #[test]
    fn loaded_chunk_does_not_alias_store_state() {
        let store = store();
        let id = SeriesId::new(5);
        block_on(store.save_chunk(id, 0, &chunk(&[(1, 10)]))).unwrap();
        let loaded = block_on(store.load_chunk(id, 0)).unwrap().unwrap();
        loaded.set(2, 20).unwrap();
        let again = block_on(store.load_chunk(id, 0)).unwrap().unwrap();
        assert_eq!(again.entries(), vec![(1, 10)]);
    }
}
