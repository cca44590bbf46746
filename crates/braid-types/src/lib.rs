//! Core vocabulary types for braid.
//!
//! Everything here is small and dependency-light: the key comparer traits,
//! the lookup direction enums shared by cursors and ranged removal, the
//! append overlap policy, the opaque series identifier used by remote
//! chunk storage, and the cancellation token threaded through async waits.

pub mod append;
pub mod cancel;
pub mod comparer;
pub mod lookup;
pub mod series_id;

pub use append::AppendMode;
pub use cancel::{CancelReason, CancelToken};
pub use comparer::{AffineComparer, KeyComparer, NaturalComparer};
pub use lookup::{Lookup, MissReason};
pub use series_id::SeriesId;
