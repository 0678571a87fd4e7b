//! Sharded storage table for cache entries.
//!
//! ## Architecture
//! - Keys are distributed across independent shards, each guarded by its
//!   own `parking_lot::RwLock` so readers never contend with writers on
//!   other shards.
//! - Values are held as `Arc<V>` so a read result can outlive the shard
//!   guard (references can't).
//! - Each entry carries its resolved TTL and a back-reference to its time
//!   wheel slot; the facade keeps both in step with the wheel while it
//!   holds the per-key lock.
//!
//! ## Storage modes
//! - `Set`: unique keys, one value each; writes replace.
//! - `Bag`: multiple values per key, unique `(key, value)` pairs; writes
//!   append, duplicates are dropped.
//! - `DuplicateBag`: multiple values per key, duplicates allowed; writes
//!   always append.
//!
//! Bag values preserve insertion order; `lookup` order is the order the
//! writes happened.
//!
//! ## Concurrency
//! Reads take only a shard read lock. Per-key write serialization is the
//! lock table's job, not the store's: a store write is a single statement
//! against one shard, so a concurrent reader observes either the old or
//! the new entry, never a torn one. The entry count lives in an atomic so
//! `len` never touches a shard lock.
//!
//! ## Implementation Notes
//! - Shard selection hashes the key with the configured `FxBuildHasher`.
//! - Operation counters are atomics snapshot into [`CacheMetrics`].

use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::ds::time_wheel::SlotRef;
use crate::error::AlreadyExists;

// =============================================================================
// Mode
// =============================================================================

/// Storage mode of a cache table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Unique keys, one value per key; writes replace.
    #[default]
    Set,
    /// Multiple values per key, unique `(key, value)` pairs.
    Bag,
    /// Multiple values per key, duplicates allowed.
    DuplicateBag,
}

impl Mode {
    /// Whether the mode holds more than one value per key.
    pub fn is_multi_value(self) -> bool {
        !matches!(self, Mode::Set)
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Point-in-time snapshot of cache activity counters.
///
/// All fields are cumulative since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    /// Lookups that found the key.
    pub hits: u64,
    /// Lookups that missed.
    pub misses: u64,
    /// Values inserted for previously absent keys (or appended in bag modes).
    pub inserts: u64,
    /// Values replaced for existing keys.
    pub updates: u64,
    /// Values removed by explicit deletes.
    pub removes: u64,
    /// Values removed by TTL expiry.
    pub expirations: u64,
}

/// Cache activity counters using atomics for thread-safe updates.
#[derive(Debug, Default)]
struct StoreCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    removes: AtomicU64,
    expirations: AtomicU64,
}

impl StoreCounters {
    fn snapshot(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    fn record_lookup(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn inc_inserts(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_updates(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    fn add_removes(&self, n: u64) {
        self.removes.fetch_add(n, Ordering::Relaxed);
    }

    fn add_expirations(&self, n: u64) {
        self.expirations.fetch_add(n, Ordering::Relaxed);
    }
}

// =============================================================================
// Entries
// =============================================================================

/// Expiry metadata of one entry, read by the facade while rescheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Expiry {
    /// Resolved TTL; `None` means the key never expires.
    pub ttl: Option<Duration>,
    /// Wheel slot currently scheduling the key, if any.
    pub slot: Option<SlotRef>,
}

#[derive(Debug)]
struct EntryState<V> {
    /// Insertion-ordered values; exactly one in `Set` mode.
    values: Vec<Arc<V>>,
    ttl: Option<Duration>,
    slot: Option<SlotRef>,
}

impl<V> EntryState<V> {
    fn new(value: Arc<V>) -> Self {
        Self {
            values: vec![value],
            ttl: None,
            slot: None,
        }
    }

    fn expiry(&self) -> Expiry {
        Expiry {
            ttl: self.ttl,
            slot: self.slot,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Sharded associative container holding `(key, values, expiry)` entries.
pub(crate) struct Store<K, V> {
    shards: Vec<RwLock<FxHashMap<K, EntryState<V>>>>,
    mode: Mode,
    /// Value entries across all shards (not unique keys).
    size: AtomicUsize,
    counters: StoreCounters,
    hasher: FxBuildHasher,
}

impl<K, V> std::fmt::Debug for Store<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("shards", &self.shards.len())
            .field("mode", &self.mode)
            .field("size", &self.size)
            .field("counters", &self.counters)
            .finish()
    }
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash,
{
    pub(crate) fn new(mode: Mode, shards: usize) -> Self {
        let shard_count = shards.max(1);
        let mut shard_vec = Vec::with_capacity(shard_count);
        shard_vec.resize_with(shard_count, || RwLock::new(FxHashMap::default()));
        Self {
            shards: shard_vec,
            mode,
            size: AtomicUsize::new(0),
            counters: StoreCounters::default(),
            hasher: FxBuildHasher,
        }
    }

    pub(crate) fn mode(&self) -> Mode {
        self.mode
    }

    fn shard(&self, key: &K) -> &RwLock<FxHashMap<K, EntryState<V>>> {
        let idx = (self.hasher.hash_one(key) as usize) % self.shards.len();
        &self.shards[idx]
    }

    // -- reads ---------------------------------------------------------------

    /// First value stored under the key. In `Set` mode this is the value.
    pub(crate) fn get(&self, key: &K) -> Option<Arc<V>> {
        let found = self.shard(key).read().get(key).map(|entry| {
            entry.values.first().cloned().expect("entry with no values")
        });
        self.counters.record_lookup(found.is_some());
        found
    }

    /// First value without touching the hit/miss counters; used by internal
    /// read-modify-write paths.
    pub(crate) fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.shard(key)
            .read()
            .get(key)
            .map(|entry| entry.values.first().cloned().expect("entry with no values"))
    }

    /// All values stored under the key, in insertion order.
    pub(crate) fn get_all(&self, key: &K) -> Vec<Arc<V>> {
        let values = self
            .shard(key)
            .read()
            .get(key)
            .map(|entry| entry.values.clone())
            .unwrap_or_default();
        self.counters.record_lookup(!values.is_empty());
        values
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.shard(key).read().contains_key(key)
    }

    /// Count of value entries (not unique keys).
    pub(crate) fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn metrics(&self) -> CacheMetrics {
        self.counters.snapshot()
    }

    /// Expiry metadata of the key, `None` when absent.
    pub(crate) fn expiry_of(&self, key: &K) -> Option<Expiry> {
        self.shard(key).read().get(key).map(EntryState::expiry)
    }

    // -- writes --------------------------------------------------------------

    /// Mode-aware write: replace in `Set`, append in bag modes (dropping
    /// `Bag`-mode duplicates). Returns whether the key already existed.
    ///
    /// Expiry metadata of an existing entry is left untouched; the facade
    /// adjusts it separately once the wheel slot is known.
    pub(crate) fn insert_value(&self, key: K, value: Arc<V>) -> bool
    where
        V: PartialEq,
    {
        let mut shard = self.shard(&key).write();
        match shard.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                match self.mode {
                    Mode::Set => {
                        entry.values[0] = value;
                        self.counters.inc_updates();
                    },
                    Mode::Bag => {
                        if !entry.values.iter().any(|held| **held == *value) {
                            entry.values.push(value);
                            self.size.fetch_add(1, Ordering::Relaxed);
                            self.counters.inc_inserts();
                        }
                    },
                    Mode::DuplicateBag => {
                        entry.values.push(value);
                        self.size.fetch_add(1, Ordering::Relaxed);
                        self.counters.inc_inserts();
                    },
                }
                true
            },
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(EntryState::new(value));
                self.size.fetch_add(1, Ordering::Relaxed);
                self.counters.inc_inserts();
                false
            },
        }
    }

    /// `Set`-mode replace without a value-equality bound; used by `update`
    /// and `get_or_store`, which are refused on multi-value tables before
    /// this point.
    pub(crate) fn replace_value(&self, key: K, value: Arc<V>) -> bool {
        debug_assert_eq!(self.mode, Mode::Set);
        let mut shard = self.shard(&key).write();
        match shard.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                occupied.get_mut().values[0] = value;
                self.counters.inc_updates();
                true
            },
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(EntryState::new(value));
                self.size.fetch_add(1, Ordering::Relaxed);
                self.counters.inc_inserts();
                false
            },
        }
    }

    /// Inserts only if the key holds no value at all (any value counts as
    /// existing in bag modes).
    pub(crate) fn insert_new_value(&self, key: K, value: Arc<V>) -> Result<(), AlreadyExists> {
        let mut shard = self.shard(&key).write();
        match shard.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => Err(AlreadyExists),
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(EntryState::new(value));
                self.size.fetch_add(1, Ordering::Relaxed);
                self.counters.inc_inserts();
                Ok(())
            },
        }
    }

    /// Records the key's resolved TTL and wheel slot. No-op when the key
    /// was deleted in the meantime.
    pub(crate) fn set_expiry(&self, key: &K, ttl: Option<Duration>, slot: Option<SlotRef>) {
        if let Some(entry) = self.shard(key).write().get_mut(key) {
            entry.ttl = ttl;
            entry.slot = slot;
        }
    }

    /// Removes every value for the key, returning the entry's expiry so the
    /// caller can cancel its wheel slot. `None` when the key was absent.
    pub(crate) fn remove(&self, key: &K) -> Option<Expiry> {
        let removed = self.shard(key).write().remove(key)?;
        self.size.fetch_sub(removed.values.len(), Ordering::Relaxed);
        self.counters.add_removes(removed.values.len() as u64);
        Some(removed.expiry())
    }

    /// Ticker-side delete: removes the entry only when its slot stamp still
    /// matches the drained candidate. A mismatch means the key was
    /// rescheduled during the race window and the candidate is a tombstone.
    pub(crate) fn expire(&self, key: &K, stamp: u64) -> bool {
        let mut shard = self.shard(key).write();
        let matches = shard
            .get(key)
            .and_then(|entry| entry.slot)
            .is_some_and(|slot| slot.stamp == stamp);
        if !matches {
            return false;
        }
        let removed = shard.remove(key).expect("checked entry disappeared");
        self.size.fetch_sub(removed.values.len(), Ordering::Relaxed);
        self.counters.add_expirations(removed.values.len() as u64);
        true
    }

    /// Drops every entry. Wheel slots are the caller's to clear.
    pub(crate) fn clear(&self) {
        let mut guards = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            guards.push(shard.write());
        }
        for guard in guards.iter_mut() {
            guard.clear();
        }
        self.size.store(0, Ordering::Relaxed);
    }
}

// =============================================================================
// Tests
// =============================================================================


#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        /// Property: duplicate-bag lookups preserve insertion order exactly.
        #[test]
        fn prop_duplicate_bag_preserves_order(values in prop::collection::vec(any::<i32>(), 0..40)) {
            let store: Store<u8, i32> = Store::new(Mode::DuplicateBag, 4);
            for value in &values {
                store.insert_value(0, Arc::new(*value));
            }
            let held: Vec<i32> = store.get_all(&0).iter().map(|v| **v).collect();
            prop_assert_eq!(held, values);
        }

        /// Property: bag mode holds the deduplicated subsequence.
        #[test]
        fn prop_bag_dedupes_preserving_first_occurrence(
            values in prop::collection::vec(0i32..8, 0..40)
        ) {
            let store: Store<u8, i32> = Store::new(Mode::Bag, 4);
            let mut expected = Vec::new();
            for value in &values {
                store.insert_value(0, Arc::new(*value));
                if !expected.contains(value) {
                    expected.push(*value);
                }
            }
            let held: Vec<i32> = store.get_all(&0).iter().map(|v| **v).collect();
            prop_assert_eq!(held, expected);
        }

        /// Property: len counts value entries across shards and modes.
        #[test]
        fn prop_len_counts_values(keys in prop::collection::vec(any::<u8>(), 0..60)) {
            let store: Store<u8, u8> = Store::new(Mode::DuplicateBag, 8);
            for key in &keys {
                store.insert_value(*key, Arc::new(*key));
            }
            prop_assert_eq!(store.len(), keys.len());
        }
    }
}
