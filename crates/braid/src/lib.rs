//! Public API facade for braid.
//!
//! Re-exports the surface users compose with: the [`SortedMap`]
//! container, the [`Series`]/[`SeriesCursor`] traits, the lazy
//! combinators behind [`SeriesOps`], the async live tail, and the
//! chunked remote facade.

pub use braid_chunks::{ChunkLease, ChunkStore, ChunkedSeries, InMemoryChunkStore};
pub use braid_core::{
    AsyncCursor, Completer, CompletionSink, ConstantSeries, CursorIter, CursorState, Series,
    SeriesCursor, SeriesOps, SortedMap, SortedMapCursor, Subscription, gate_metrics, live_metrics,
};
pub use braid_core::task;
pub use braid_error::{BraidError, Result};
pub use braid_types::{
    AffineComparer, AppendMode, CancelReason, CancelToken, KeyComparer, Lookup, MissReason,
    NaturalComparer, SeriesId,
};
