//! Sorted container: the materialized, mutable series.
//!
//! A [`SortedMap`] owns two parallel arrays (keys, values) kept ordered by
//! its comparer, or by insertion order when constructed indexed. All
//! mutations run under the single-writer latch of a
//! [`VersionGate`](crate::version_gate::VersionGate): bump `next_version`,
//! mutate, publish, notify. Readers take a short read lock per operation
//! and wrap multi-step reads in the gate's optimistic retry, so they never
//! block writers for long and never observe torn state.
//!
//! Cursors cache the entry they are positioned on and re-anchor by key
//! when they observe a version change, which keeps clones and live tails
//! correct under concurrent writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use braid_error::{BraidError, Result};
use braid_types::{AppendMode, KeyComparer, Lookup, MissReason, NaturalComparer};
use parking_lot::RwLock;

use crate::cursor::{CursorState, SeriesCursor};
use crate::live::Completer;
use crate::series::Series;
use crate::version_gate::VersionGate;

/// Hard ceiling on entry count. Growth below it is Vec's amortized
/// doubling.
pub const MAX_LEN: usize = 1 << 30;

// ---------------------------------------------------------------------------
// Data + lookup
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct MapData<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
}

impl<K, V> MapData<K, V> {
    fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Resolve `key` + `lookup` to an index, or classify the miss.
///
/// Sorted mode binary-searches; indexed mode supports `Eq` only (with
/// insertion ordering there is no key order to bias a miss toward).
fn locate<K, C: KeyComparer<K>>(
    keys: &[K],
    comparer: &C,
    indexed: bool,
    key: &K,
    lookup: Lookup,
) -> std::result::Result<usize, MissReason> {
    if keys.is_empty() {
        return Err(MissReason::Empty);
    }
    if indexed {
        return match lookup {
            Lookup::Eq => keys
                .iter()
                .position(|k| comparer.keys_equal(k, key))
                .ok_or(MissReason::Absent),
            _ => Err(MissReason::Absent),
        };
    }
    match keys.binary_search_by(|probe| comparer.compare(probe, key)) {
        Ok(i) => match lookup {
            Lookup::Eq | Lookup::Le | Lookup::Ge => Ok(i),
            Lookup::Lt => {
                if i == 0 {
                    Err(MissReason::BelowRange)
                } else {
                    Ok(i - 1)
                }
            }
            Lookup::Gt => {
                if i + 1 == keys.len() {
                    Err(MissReason::AboveRange)
                } else {
                    Ok(i + 1)
                }
            }
        },
        Err(insertion) => match lookup {
            Lookup::Eq => Err(if insertion == 0 {
                MissReason::BelowRange
            } else if insertion == keys.len() {
                MissReason::AboveRange
            } else {
                MissReason::Absent
            }),
            Lookup::Lt | Lookup::Le => {
                if insertion == 0 {
                    Err(MissReason::BelowRange)
                } else {
                    Ok(insertion - 1)
                }
            }
            Lookup::Gt | Lookup::Ge => {
                if insertion == keys.len() {
                    Err(MissReason::AboveRange)
                } else {
                    Ok(insertion)
                }
            }
        },
    }
}

// ---------------------------------------------------------------------------
// SortedMap
// ---------------------------------------------------------------------------

struct MapInner<K, V, C> {
    comparer: C,
    indexed: bool,
    gate: VersionGate,
    data: RwLock<MapData<K, V>>,
    completed: AtomicBool,
    completer: Arc<Completer>,
}

/// A materialized, versioned, subscribable sorted map.
///
/// The handle is a cheap `Arc` clone; clones share the same container.
pub struct SortedMap<K, V, C = NaturalComparer> {
    inner: Arc<MapInner<K, V, C>>,
}

impl<K, V, C> Clone for SortedMap<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, C> std::fmt::Debug for SortedMap<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedMap")
            .field("len", &self.inner.data.read().len())
            .field("version", &self.inner.gate.version())
            .field("indexed", &self.inner.indexed)
            .field("completed", &self.inner.completed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<K: Ord, V> SortedMap<K, V, NaturalComparer> {
    /// Empty map over the natural key order.
    #[must_use]
    pub fn new() -> Self {
        Self::with_comparer(NaturalComparer)
    }
}

impl<K: Ord, V> Default for SortedMap<K, V, NaturalComparer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C: KeyComparer<K>> SortedMap<K, V, C> {
    /// Empty map over an explicit comparer.
    #[must_use]
    pub fn with_comparer(comparer: C) -> Self {
        Self::build(comparer, false)
    }

    /// Empty map ordered by insertion instead of by key.
    #[must_use]
    pub fn indexed(comparer: C) -> Self {
        Self::build(comparer, true)
    }

    fn build(comparer: C, indexed: bool) -> Self {
        Self {
            inner: Arc::new(MapInner {
                comparer,
                indexed,
                gate: VersionGate::new(0),
                data: RwLock::new(MapData {
                    keys: Vec::new(),
                    values: Vec::new(),
                }),
                completed: AtomicBool::new(false),
                completer: Arc::new(Completer::new()),
            }),
        }
    }
}

impl<K, V, C> SortedMap<K, V, C>
where
    K: Clone,
    V: Clone,
    C: KeyComparer<K>,
{
    /// Build from entries via repeated `set`.
    pub fn from_entries(
        comparer: C,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self> {
        let map = Self::with_comparer(comparer);
        for (k, v) in entries {
            map.set(k, v)?;
        }
        Ok(map)
    }

    // -- Metadata -----------------------------------------------------------

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.data.read().len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Published mutation counter.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.gate.version()
    }

    /// Pre-publish counter; exposed for the optimistic read tests.
    #[must_use]
    pub fn next_version(&self) -> u64 {
        self.inner.gate.next_version()
    }

    /// Whether `complete()` has been called.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// Whether keys are in insertion order.
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.inner.indexed
    }

    // -- Reads --------------------------------------------------------------

    /// Point lookup; `None` when absent.
    #[must_use]
    pub fn try_get(&self, key: &K) -> Option<V> {
        self.read_gate("try_get", || {
            let data = self.inner.data.read();
            locate(
                &data.keys,
                &self.inner.comparer,
                self.inner.indexed,
                key,
                Lookup::Eq,
            )
            .ok()
            .map(|i| data.values[i].clone())
        })
    }

    /// Point lookup; `KeyNotFound` when absent.
    pub fn get(&self, key: &K) -> Result<V> {
        self.try_get(key).ok_or(BraidError::KeyNotFound)
    }

    /// Whether the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.try_get(key).is_some()
    }

    /// Position of the key, if present.
    #[must_use]
    pub fn index_of_key(&self, key: &K) -> Option<usize> {
        self.read_gate("index_of_key", || {
            let data = self.inner.data.read();
            locate(
                &data.keys,
                &self.inner.comparer,
                self.inner.indexed,
                key,
                Lookup::Eq,
            )
            .ok()
        })
    }

    /// Smallest entry (or oldest, when indexed).
    #[must_use]
    pub fn first(&self) -> Option<(K, V)> {
        self.read_gate("first", || {
            let data = self.inner.data.read();
            let key = data.keys.first()?.clone();
            let value = data.values.first()?.clone();
            Some((key, value))
        })
    }

    /// Largest entry (or newest, when indexed).
    #[must_use]
    pub fn last(&self) -> Option<(K, V)> {
        self.read_gate("last", || {
            let data = self.inner.data.read();
            let key = data.keys.last()?.clone();
            let value = data.values.last()?.clone();
            Some((key, value))
        })
    }

    /// Owned snapshot of every entry, in order.
    #[must_use]
    pub fn entries(&self) -> Vec<(K, V)> {
        self.read_gate("entries", || {
            let data = self.inner.data.read();
            data.keys
                .iter()
                .cloned()
                .zip(data.values.iter().cloned())
                .collect()
        })
    }

    // -- Writes -------------------------------------------------------------

    /// Insert or replace. Returns `true` when a new key was inserted.
    pub fn set(&self, key: K, value: V) -> Result<bool> {
        self.mutate("set", |data, comparer, indexed| {
            match locate(&data.keys, comparer, indexed, &key, Lookup::Eq) {
                Ok(i) => {
                    data.values[i] = value;
                    Ok((false, true))
                }
                Err(_) => {
                    let at = insertion_index(data, comparer, indexed, &key)?;
                    data.keys.insert(at, key);
                    data.values.insert(at, value);
                    Ok((true, true))
                }
            }
        })
    }

    /// Insert a new key; `Duplicate` when it is already present.
    pub fn add(&self, key: K, value: V) -> Result<()> {
        if self.try_add(key, value)? {
            Ok(())
        } else {
            Err(BraidError::Duplicate)
        }
    }

    /// Insert a new key; `false` when it is already present.
    pub fn try_add(&self, key: K, value: V) -> Result<bool> {
        self.mutate("try_add", |data, comparer, indexed| {
            match locate(&data.keys, comparer, indexed, &key, Lookup::Eq) {
                Ok(_) => Ok((false, false)),
                Err(_) => {
                    let at = insertion_index(data, comparer, indexed, &key)?;
                    data.keys.insert(at, key);
                    data.values.insert(at, value);
                    Ok((true, true))
                }
            }
        })
    }

    /// Prepend; `OutOfOrder` unless strictly smaller than the current
    /// first key.
    pub fn add_first(&self, key: K, value: V) -> Result<()> {
        if self.try_add_first(key, value)? {
            Ok(())
        } else {
            Err(BraidError::OutOfOrder)
        }
    }

    /// Prepend; `false` unless strictly smaller than the current first.
    pub fn try_add_first(&self, key: K, value: V) -> Result<bool> {
        self.mutate("try_add_first", |data, comparer, indexed| {
            if !indexed {
                if let Some(head) = data.keys.first() {
                    if comparer.compare(&key, head) != std::cmp::Ordering::Less {
                        return Ok((false, false));
                    }
                }
            }
            check_capacity(data)?;
            data.keys.insert(0, key);
            data.values.insert(0, value);
            Ok((true, true))
        })
    }

    /// Append; `OutOfOrder` unless strictly larger than the current last
    /// key.
    pub fn add_last(&self, key: K, value: V) -> Result<()> {
        if self.try_add_last(key, value)? {
            Ok(())
        } else {
            Err(BraidError::OutOfOrder)
        }
    }

    /// Append; `false` unless strictly larger than the current last.
    pub fn try_add_last(&self, key: K, value: V) -> Result<bool> {
        self.mutate("try_add_last", |data, comparer, indexed| {
            if !indexed {
                if let Some(tail) = data.keys.last() {
                    if comparer.compare(&key, tail) != std::cmp::Ordering::Greater {
                        return Ok((false, false));
                    }
                }
            }
            check_capacity(data)?;
            data.keys.push(key);
            data.values.push(value);
            Ok((true, true))
        })
    }

    /// Remove a key, returning its value.
    pub fn try_remove(&self, key: &K) -> Result<Option<V>> {
        self.mutate("try_remove", |data, comparer, indexed| {
            match locate(&data.keys, comparer, indexed, key, Lookup::Eq) {
                Ok(i) => {
                    data.keys.remove(i);
                    let value = data.values.remove(i);
                    Ok((Some(value), true))
                }
                Err(_) => Ok((None, false)),
            }
        })
    }

    /// Remove and return the first entry.
    pub fn try_remove_first(&self) -> Result<Option<(K, V)>> {
        self.mutate("try_remove_first", |data, _, _| {
            if data.keys.is_empty() {
                Ok((None, false))
            } else {
                let key = data.keys.remove(0);
                let value = data.values.remove(0);
                Ok((Some((key, value)), true))
            }
        })
    }

    /// Remove and return the last entry.
    pub fn try_remove_last(&self) -> Result<Option<(K, V)>> {
        self.mutate("try_remove_last", |data, _, _| {
            match (data.keys.pop(), data.values.pop()) {
                (Some(key), Some(value)) => Ok((Some((key, value)), true)),
                _ => Ok((None, false)),
            }
        })
    }

    /// Bulk removal of the half-range selected by `pivot` and `lookup`.
    ///
    /// `Eq` removes one key; `Lt`/`Le` remove the prefix up to the pivot,
    /// `Gt`/`Ge` the suffix from it. When the pivot falls outside the
    /// range on the removal side the call is a no-op returning 0.
    pub fn try_remove_many(&self, pivot: &K, lookup: Lookup) -> Result<usize> {
        if lookup == Lookup::Eq {
            return Ok(usize::from(self.try_remove(pivot)?.is_some()));
        }
        self.mutate("try_remove_many", |data, comparer, indexed| {
            if indexed {
                tracing::debug!(target: "braid.map", "ranged removal unsupported in indexed mode");
                return Ok((0, false));
            }
            match locate(&data.keys, comparer, indexed, pivot, lookup) {
                Ok(i) if lookup.accepts_smaller() => {
                    data.keys.drain(..=i);
                    data.values.drain(..=i);
                    Ok((i + 1, true))
                }
                Ok(i) => {
                    let removed = data.len() - i;
                    data.keys.truncate(i);
                    data.values.truncate(i);
                    Ok((removed, true))
                }
                Err(_) => Ok((0, false)),
            }
        })
    }

    /// Splice `other` onto this map's tail under the given overlap
    /// policy. Returns the number of entries taken from `other`.
    pub fn try_append(&self, other: &Self, mode: AppendMode) -> Result<usize>
    where
        V: PartialEq,
    {
        // Snapshot the source first; taking its read lock inside our own
        // write latch invites lock-order inversion between two maps
        // appending to each other.
        let incoming = other.entries();
        self.mutate("try_append", |data, comparer, indexed| {
            if indexed {
                return Err(BraidError::invariant(
                    "append is defined for sorted maps only",
                ));
            }
            append_entries(data, comparer, incoming, mode)
        })
    }

    /// One-way transition to the completed state; wakes every waiter.
    ///
    /// Content and version are frozen afterwards: any mutation fails with
    /// `Completed`. Calling this twice is a no-op.
    pub fn complete(&self) {
        {
            let _ticket = self.inner.gate.begin_write();
            if self.inner.completed.swap(true, Ordering::AcqRel) {
                return;
            }
            // Ticket dropped uncommitted: completion freezes the version.
        }
        tracing::debug!(target: "braid.map", version = self.version(), "series completed");
        self.inner.completer.notify(true);
    }

    // -- Internals ----------------------------------------------------------

    fn read_gate<R>(&self, label: &str, f: impl FnMut() -> R) -> R {
        match self.inner.gate.read_consistent(label, f) {
            Some(result) => result,
            None => stalled_gate(label),
        }
    }

    fn mutate<R>(
        &self,
        label: &str,
        f: impl FnOnce(&mut MapData<K, V>, &C, bool) -> Result<(R, bool)>,
    ) -> Result<R> {
        if self.is_completed() {
            return Err(BraidError::Completed);
        }
        let ticket = self.inner.gate.begin_write();
        // Re-check under the latch: a concurrent `complete` may have won.
        if self.is_completed() {
            return Err(BraidError::Completed);
        }
        let outcome = {
            let mut data = self.inner.data.write();
            f(&mut data, &self.inner.comparer, self.inner.indexed)
        };
        match outcome {
            Ok((result, true)) => {
                let version = ticket.version();
                ticket.commit();
                tracing::trace!(target: "braid.map", op = label, version, "commit");
                self.inner.completer.notify(false);
                Ok(result)
            }
            Ok((result, false)) => Ok(result),
            Err(err) => Err(err),
        }
    }

    /// Fresh cursor over this map.
    #[must_use]
    pub fn cursor(&self) -> SortedMapCursor<K, V, C> {
        SortedMapCursor {
            inner: Arc::clone(&self.inner),
            state: CursorState::Uninitialized,
            pos: 0,
            seen_version: 0,
            current: None,
        }
    }
}

fn check_capacity<K, V>(data: &MapData<K, V>) -> Result<()> {
    if data.len() >= MAX_LEN {
        Err(BraidError::CapacityExceeded { max: MAX_LEN })
    } else {
        Ok(())
    }
}

fn insertion_index<K, V, C: KeyComparer<K>>(
    data: &MapData<K, V>,
    comparer: &C,
    indexed: bool,
    key: &K,
) -> Result<usize> {
    check_capacity(data)?;
    if indexed {
        return Ok(data.len());
    }
    match data
        .keys
        .binary_search_by(|probe| comparer.compare(probe, key))
    {
        Ok(_) => Err(BraidError::invariant("insertion probe hit an existing key")),
        Err(at) => Ok(at),
    }
}

fn append_entries<K, V, C>(
    data: &mut MapData<K, V>,
    comparer: &C,
    incoming: Vec<(K, V)>,
    mode: AppendMode,
) -> Result<(usize, bool)>
where
    K: Clone,
    V: Clone + PartialEq,
    C: KeyComparer<K>,
{
    use std::cmp::Ordering::Greater;

    let Some((other_first, _)) = incoming.first() else {
        return match mode {
            AppendMode::RequireEqualOverlap => {
                Err(BraidError::overlap("no overlap: incoming series is empty"))
            }
            _ => Ok((0, false)),
        };
    };

    let overlap = match data.keys.last() {
        Some(self_last) => comparer.compare(other_first, self_last) != Greater,
        None => false,
    };

    if !overlap {
        if mode == AppendMode::RequireEqualOverlap {
            return Err(BraidError::overlap(
                "no overlap: incoming series starts after the current tail",
            ));
        }
        let count = incoming.len();
        if data.len() + count > MAX_LEN {
            return Err(BraidError::CapacityExceeded { max: MAX_LEN });
        }
        for (k, v) in incoming {
            data.keys.push(k);
            data.values.push(v);
        }
        return Ok((count, count > 0));
    }

    match mode {
        AppendMode::RejectOnOverlap => Err(BraidError::overlap(
            "incoming series overlaps the current tail",
        )),
        AppendMode::DropOldOverlap => {
            if let Ok(cut) = locate(&data.keys, comparer, false, other_first, Lookup::Ge) {
                data.keys.truncate(cut);
                data.values.truncate(cut);
            }
            let count = incoming.len();
            if data.len() + count > MAX_LEN {
                return Err(BraidError::CapacityExceeded { max: MAX_LEN });
            }
            for (k, v) in incoming {
                data.keys.push(k);
                data.values.push(v);
            }
            Ok((count, count > 0))
        }
        AppendMode::IgnoreEqualOverlap | AppendMode::RequireEqualOverlap => {
            // The overlapping region must match element-wise on both
            // sides before the strictly-newer suffix is spliced on.
            let start = locate(&data.keys, comparer, false, other_first, Lookup::Ge)
                .map_err(|_| BraidError::invariant("overlap detected but no splice point"))?;
            let tail_len = data.len() - start;
            if incoming.len() < tail_len {
                return Err(BraidError::overlap(
                    "incoming series ends inside the overlapping range",
                ));
            }
            for (offset, (k, v)) in incoming[..tail_len].iter().enumerate() {
                let i = start + offset;
                if !comparer.keys_equal(k, &data.keys[i]) || *v != data.values[i] {
                    return Err(BraidError::overlap(
                        "overlapping range differs between the two series",
                    ));
                }
            }
            let suffix = &incoming[tail_len..];
            let count = suffix.len();
            if data.len() + count > MAX_LEN {
                return Err(BraidError::CapacityExceeded { max: MAX_LEN });
            }
            for (k, v) in suffix {
                data.keys.push(k.clone());
                data.values.push(v.clone());
            }
            Ok((count, count > 0))
        }
    }
}

#[cold]
fn stalled_gate(label: &str) -> ! {
    // The writer latch guarantees forward progress; exhausting the retry
    // budget means the version protocol itself is broken.
    tracing::error!(target: "braid.map", label, "optimistic read starved; latch state lost");
    panic!("braid: optimistic read starved on `{label}`; version invariants are broken");
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Planned outcome of a navigation step, computed under the gate.
enum Plan<K, V> {
    Hit {
        pos: usize,
        entry: (K, V),
        version: u64,
    },
    Start {
        version: u64,
    },
    End {
        version: u64,
    },
}

/// Cursor over a [`SortedMap`].
///
/// Holds the entry it is positioned on; when the map's version moves, the
/// next navigation re-anchors by key instead of trusting the stale index.
/// `AfterEnd` keeps the last anchor so `move_next` picks up data appended
/// later — the live-tail path.
pub struct SortedMapCursor<K, V, C> {
    inner: Arc<MapInner<K, V, C>>,
    state: CursorState,
    pos: usize,
    seen_version: u64,
    current: Option<(K, V)>,
}

impl<K: Clone, V: Clone, C> Clone for SortedMapCursor<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            state: self.state,
            pos: self.pos,
            seen_version: self.seen_version,
            current: self.current.clone(),
        }
    }
}

impl<K, V, C> std::fmt::Debug for SortedMapCursor<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedMapCursor")
            .field("state", &self.state)
            .field("pos", &self.pos)
            .field("seen_version", &self.seen_version)
            .finish_non_exhaustive()
    }
}

impl<K, V, C> SortedMapCursor<K, V, C>
where
    K: Clone,
    V: Clone,
    C: KeyComparer<K>,
{
    /// Navigation state (diagnostics and tests).
    #[must_use]
    pub fn state(&self) -> CursorState {
        self.state
    }

    fn plan<F>(&self, label: &str, f: F) -> Plan<K, V>
    where
        F: FnMut() -> Plan<K, V>,
    {
        match self.inner.gate.read_consistent(label, f) {
            Some(plan) => plan,
            None => stalled_gate(label),
        }
    }

    fn apply(&mut self, plan: Plan<K, V>) -> bool {
        match plan {
            Plan::Hit {
                pos,
                entry,
                version,
            } => {
                self.state = CursorState::Positioned;
                self.pos = pos;
                self.current = Some(entry);
                self.seen_version = version;
                true
            }
            Plan::Start { version } => {
                self.state = CursorState::BeforeStart;
                self.seen_version = version;
                false
            }
            Plan::End { version } => {
                self.state = CursorState::AfterEnd;
                self.seen_version = version;
                false
            }
        }
    }

    fn hit_at(data: &MapData<K, V>, pos: usize, version: u64) -> Plan<K, V> {
        Plan::Hit {
            pos,
            entry: (data.keys[pos].clone(), data.values[pos].clone()),
            version,
        }
    }

    fn anchor_key(&self) -> Option<&K> {
        self.current.as_ref().map(|(k, _)| k)
    }
}

impl<K, V, C> SeriesCursor for SortedMapCursor<K, V, C>
where
    K: Clone,
    V: Clone,
    C: KeyComparer<K>,
{
    type Key = K;
    type Value = V;
    type Comparer = C;

    fn comparer(&self) -> C {
        self.inner.comparer.clone()
    }

    fn reset(&mut self) {
        self.state = CursorState::Uninitialized;
        self.pos = 0;
        self.seen_version = 0;
        self.current = None;
    }

    fn move_first(&mut self) -> bool {
        let plan = self.plan("move_first", || {
            let data = self.inner.data.read();
            let version = self.inner.gate.version();
            if data.len() == 0 {
                Plan::Start { version }
            } else {
                Self::hit_at(&data, 0, version)
            }
        });
        self.apply(plan)
    }

    fn move_last(&mut self) -> bool {
        let plan = self.plan("move_last", || {
            let data = self.inner.data.read();
            let version = self.inner.gate.version();
            if data.len() == 0 {
                Plan::End { version }
            } else {
                Self::hit_at(&data, data.len() - 1, version)
            }
        });
        self.apply(plan)
    }

    fn move_next(&mut self) -> bool {
        let plan = self.plan("move_next", || {
            let data = self.inner.data.read();
            let version = self.inner.gate.version();
            let comparer = &self.inner.comparer;
            let indexed = self.inner.indexed;
            match self.state {
                CursorState::Uninitialized | CursorState::BeforeStart => {
                    if data.len() == 0 {
                        Plan::End { version }
                    } else {
                        Self::hit_at(&data, 0, version)
                    }
                }
                CursorState::Positioned if self.seen_version == version => {
                    if self.pos + 1 < data.len() {
                        Self::hit_at(&data, self.pos + 1, version)
                    } else {
                        Plan::End { version }
                    }
                }
                CursorState::Positioned | CursorState::AfterEnd => {
                    match self.anchor_key() {
                        Some(anchor) => {
                            // Stale or past the end: re-anchor to the
                            // first key strictly after the one we hold.
                            match locate(&data.keys, comparer, indexed, anchor, Lookup::Gt) {
                                Ok(i) => Self::hit_at(&data, i, version),
                                Err(_) => Plan::End { version },
                            }
                        }
                        None => {
                            if data.len() == 0 {
                                Plan::End { version }
                            } else {
                                Self::hit_at(&data, 0, version)
                            }
                        }
                    }
                }
            }
        });
        self.apply(plan)
    }

    fn move_previous(&mut self) -> bool {
        let plan = self.plan("move_previous", || {
            let data = self.inner.data.read();
            let version = self.inner.gate.version();
            let comparer = &self.inner.comparer;
            let indexed = self.inner.indexed;
            match self.state {
                CursorState::Uninitialized | CursorState::AfterEnd => match self.anchor_key() {
                    Some(anchor) if self.state == CursorState::AfterEnd => {
                        match locate(&data.keys, comparer, indexed, anchor, Lookup::Le) {
                            Ok(i) => Self::hit_at(&data, i, version),
                            Err(_) => Plan::Start { version },
                        }
                    }
                    _ => {
                        if data.len() == 0 {
                            Plan::Start { version }
                        } else {
                            Self::hit_at(&data, data.len() - 1, version)
                        }
                    }
                },
                CursorState::Positioned if self.seen_version == version => {
                    if self.pos > 0 {
                        Self::hit_at(&data, self.pos - 1, version)
                    } else {
                        Plan::Start { version }
                    }
                }
                CursorState::Positioned | CursorState::BeforeStart => match self.anchor_key() {
                    Some(anchor) => {
                        match locate(&data.keys, comparer, indexed, anchor, Lookup::Lt) {
                            Ok(i) => Self::hit_at(&data, i, version),
                            Err(_) => Plan::Start { version },
                        }
                    }
                    None => {
                        if data.len() == 0 {
                            Plan::Start { version }
                        } else {
                            Self::hit_at(&data, data.len() - 1, version)
                        }
                    }
                },
            }
        });
        self.apply(plan)
    }

    fn move_at(&mut self, key: &K, lookup: Lookup) -> bool {
        let plan = self.plan("move_at", || {
            let data = self.inner.data.read();
            let version = self.inner.gate.version();
            match locate(
                &data.keys,
                &self.inner.comparer,
                self.inner.indexed,
                key,
                lookup,
            ) {
                Ok(i) => Self::hit_at(&data, i, version),
                Err(MissReason::AboveRange) => Plan::End { version },
                Err(_) => Plan::Start { version },
            }
        });
        self.apply(plan)
    }

    fn key(&self) -> Option<K> {
        if self.state.is_positioned() {
            self.current.as_ref().map(|(k, _)| k.clone())
        } else {
            None
        }
    }

    fn value(&self) -> Option<V> {
        if self.state.is_positioned() {
            self.current.as_ref().map(|(_, v)| v.clone())
        } else {
            None
        }
    }

    fn try_get(&self, key: &K) -> Option<V> {
        match self.inner.gate.read_consistent("cursor_try_get", || {
            let data = self.inner.data.read();
            locate(
                &data.keys,
                &self.inner.comparer,
                self.inner.indexed,
                key,
                Lookup::Eq,
            )
            .ok()
            .map(|i| data.values[i].clone())
        }) {
            Some(found) => found,
            None => stalled_gate("cursor_try_get"),
        }
    }

    fn source_completed(&self) -> bool {
        self.inner.completed.load(Ordering::Acquire)
    }

    fn completer(&self) -> Option<Arc<Completer>> {
        Some(Arc::clone(&self.inner.completer))
    }
}

// ---------------------------------------------------------------------------
// Series impl
// ---------------------------------------------------------------------------

impl<K, V, C> Series for SortedMap<K, V, C>
where
    K: Clone,
    V: Clone,
    C: KeyComparer<K>,
{
    type Key = K;
    type Value = V;
    type Comparer = C;
    type Cursor = SortedMapCursor<K, V, C>;

    fn comparer(&self) -> C {
        self.inner.comparer.clone()
    }

    fn cursor(&self) -> Self::Cursor {
        SortedMap::cursor(self)
    }

    fn is_indexed(&self) -> bool {
        self.inner.indexed
    }

    fn is_completed(&self) -> bool {
        SortedMap::is_completed(self)
    }

    fn version(&self) -> u64 {
        SortedMap::version(self)
    }

    fn completer(&self) -> Option<Arc<Completer>> {
        Some(Arc::clone(&self.inner.completer))
    }

    fn first(&self) -> Option<(K, V)> {
        SortedMap::first(self)
    }

    fn last(&self) -> Option<(K, V)> {
        SortedMap::last(self)
    }

    fn try_get(&self, key: &K) -> Option<V> {
        SortedMap::try_get(self, key)
    }

    fn is_empty(&self) -> bool {
        SortedMap::is_empty(self)
    }
}
