//! Ordered, versioned, reactive series with a lazy cursor algebra.
//!
//! The core pieces:
//!
//! - [`SortedMap`]: the materialized, mutable container — parallel sorted
//!   arrays behind a single-writer latch with optimistic versioned reads.
//! - [`Series`] / [`SeriesCursor`]: the uniform surface for anything
//!   navigable; combinator cursors nest by value and monomorphize flat.
//! - [`combinators`]: `map`, `filter`, scalar ops, comparisons, `zip` —
//!   all lazy, all built through [`SeriesOps`].
//! - [`AsyncCursor`]: awaitable live tail over any subscribable series,
//!   runtime-agnostic, cancelled through a
//!   [`CancelToken`](braid_types::CancelToken).

pub mod combinators;
pub mod cursor;
pub mod live;
pub mod series;
pub mod sorted_map;
pub mod task;
pub mod version_gate;

pub use combinators::{
    ConstantSeries, Filtered, Mapped, SeriesOps, ValueOp, ValuePredicate, ZipMapped, Zipped,
};
pub use cursor::{CursorIter, CursorState, SeriesCursor};
pub use live::{AsyncCursor, Completer, CompletionSink, LiveMetrics, Subscription, live_metrics};
pub use series::Series;
pub use sorted_map::{MAX_LEN, SortedMap, SortedMapCursor};
pub use version_gate::{GateMetrics, VersionGate, WriteTicket, gate_metrics};
