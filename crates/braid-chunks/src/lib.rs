//! Chunk-keyed series facade over remote storage.
//!
//! A [`ChunkedSeries`] presents a series whose values are themselves
//! sorted maps (chunks), keyed by the affine distance `diff(k, origin)`
//! of the chunk's key. All I/O goes through the five pluggable hooks of
//! [`ChunkStore`]; the facade adds a local chunk index (snapshot-swapped
//! on refresh), a chunk cache, and lease-scoped write-through.

pub mod facade;
pub mod memory;
pub mod store;

pub use facade::ChunkedSeries;
pub use memory::InMemoryChunkStore;
pub use store::{ChunkLease, ChunkStore, StoreError, StoreResult};
