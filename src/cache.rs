//! The cache facade: public operations over store, locks, and wheel.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                     Cache<K, V>  (cloneable handle)                  │
//!   │                               │                                      │
//!   │                         Arc<Shared>                                  │
//!   │   ┌──────────────┬──────────────┬───────────────┬────────────────┐   │
//!   │   │ Store        │ LockTable    │ TimeWheel     │ EventDispatcher│   │
//!   │   │ sharded map  │ per-key      │ Mutex-guarded │ queue + worker │   │
//!   │   │ Arc<V> vals  │ exclusion    │ ring          │ thread         │   │
//!   │   └──────────────┴──────────────┴───────────────┴────────────────┘   │
//!   │                                                                      │
//!   │   read path:   get ──► store shard read lock only                    │
//!   │   write path:  put ──► per-key lock ──► store ──► wheel ──► event    │
//!   │   ticker path: advance wheel ──► per-key lock ──► stamp check        │
//!   │                ──► delete ──► event                                  │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency contract
//!
//! - `get`, `get_all`, `size`, `contains` and every `dirty_*` operation
//!   never touch the per-key lock table.
//! - Locked writes to the same key are totally ordered (FIFO grant order);
//!   writes to distinct keys proceed in parallel.
//! - The wheel mutex is only ever taken *while* holding a per-key lock or
//!   from lock-free read paths; it is never held across user code, so the
//!   lock order per-key ► wheel is acyclic.
//! - A drained expiry candidate is confirmed against the entry's slot
//!   stamp under the key's lock before anything is deleted, so a write
//!   racing the ticker either reschedules the key (candidate becomes a
//!   tombstone) or happens after the expiry.
//!
//! ## TTL resolution
//!
//! Writes resolve their [`Ttl`] policy against the configuration:
//! `Default` becomes the cache's `global_ttl`, `After`/`Infinity` apply
//! verbatim, `NoUpdate` leaves the entry's deadline untouched. With TTL
//! disabled every policy degrades to "never expire".

use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::builder::Config;
use crate::ds::lock_table::LockTable;
use crate::ds::time_wheel::TimeWheel;
use crate::error::{AlreadyExists, ConfigError, Locked, LockTimeout, NoSuchCache, UpdateError};
use crate::events::{CacheEvent, CacheId, EventDispatcher, EventHook};
use crate::item::{Item, Ttl};
use crate::store::{CacheMetrics, Mode, Store};
use crate::registry;

/// Concurrent key-value cache with per-key locking and TTL expiry.
///
/// `Cache` is a cheaply cloneable handle; clones share one table. The
/// backing threads (TTL ticker, event dispatcher) wind down when the last
/// handle is dropped.
///
/// # Example
///
/// ```
/// use lockcache::{CacheBuilder, TtlCheck};
///
/// let cache = CacheBuilder::<&str, u32>::new()
///     .ttl_check_interval(TtlCheck::Disabled)
///     .build()
///     .unwrap();
///
/// cache.put("hits", 1);
/// cache.update("hits", |current| {
///     Ok::<u32, std::convert::Infallible>(current.copied().unwrap_or(0) + 1)
/// })
/// .unwrap();
/// assert_eq!(cache.get(&"hits").as_deref(), Some(&2));
/// ```
pub struct Cache<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> std::fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .finish()
    }
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

pub(crate) struct Shared<K, V> {
    id: CacheId,
    config: Config,
    store: Store<K, V>,
    locks: LockTable<K>,
    wheel: Option<Mutex<TimeWheel<K>>>,
    events: Option<EventDispatcher<K, V>>,
    name: Option<String>,
    /// Kept so dropping the last handle disconnects the ticker.
    _ticker_shutdown: Option<Sender<()>>,
}

impl<K, V> Drop for Shared<K, V> {
    fn drop(&mut self) {
        if let Some(name) = &self.name {
            registry::unregister(name);
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn from_config(
        config: Config,
        hook: Option<Arc<EventHook<K, V>>>,
        name: Option<String>,
    ) -> Result<Self, ConfigError> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let shared = Arc::new(Shared {
            id: CacheId::next(),
            store: Store::new(config.mode, config.shards),
            locks: LockTable::new(),
            wheel: config
                .tick
                .map(|tick| Mutex::new(TimeWheel::new(config.time_size, tick))),
            events: hook.map(EventDispatcher::start),
            name,
            _ticker_shutdown: config.tick.map(|_| shutdown_tx),
            config,
        });

        if let Some(name) = shared.name.clone() {
            registry::register(name, &shared)?;
        }

        if let Some(tick) = shared.config.tick {
            let weak = Arc::downgrade(&shared);
            thread::Builder::new()
                .name("lockcache-ttl".into())
                .spawn(move || ticker_loop(weak, shutdown_rx, tick))
                .expect("failed to spawn TTL ticker thread");
        }

        Ok(Self { shared })
    }

    pub(crate) fn from_shared(shared: Arc<Shared<K, V>>) -> Self {
        Self { shared }
    }

    /// Resolves a cache registered under `name` by the builder.
    ///
    /// Fails with [`NoSuchCache`] when the name was never registered, the
    /// cache has been dropped, or it was built with different key/value
    /// types.
    pub fn lookup(name: &str) -> Result<Self, NoSuchCache> {
        registry::lookup(name)
    }

    // -- reads ---------------------------------------------------------------

    /// Returns the value stored under the key, without blocking on any
    /// per-key lock. In bag modes this is the first (oldest) value; use
    /// [`get_all`](Cache::get_all) for the full sequence.
    ///
    /// With `touch_on_read` configured, a hit reschedules the key's TTL.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let value = self.shared.store.get(key)?;
        if self.shared.config.touch_on_read {
            self.shared.reschedule_current(key);
        }
        Some(value)
    }

    /// Returns every value stored under the key in insertion order; empty
    /// when the key is absent. Never blocks on any per-key lock.
    pub fn get_all(&self, key: &K) -> Vec<Arc<V>> {
        let values = self.shared.store.get_all(key);
        if self.shared.config.touch_on_read && !values.is_empty() {
            self.shared.reschedule_current(key);
        }
        values
    }

    /// Number of stored values (not unique keys). Never blocks.
    pub fn size(&self) -> usize {
        self.shared.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.store.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shared.store.contains(key)
    }

    /// Snapshot of the cache's activity counters.
    pub fn metrics(&self) -> CacheMetrics {
        self.shared.store.metrics()
    }

    /// The cache's storage mode.
    pub fn mode(&self) -> Mode {
        self.shared.store.mode()
    }

    /// Process-wide unique id, as carried in emitted events.
    pub fn id(&self) -> CacheId {
        self.shared.id
    }

    /// Whether the TTL engine (and its ticker thread) is active.
    pub fn ttl_enabled(&self) -> bool {
        self.shared.wheel.is_some()
    }

    // -- locked writes -------------------------------------------------------

    /// Stores a value under the key: replaces in `Set` mode, appends in bag
    /// modes. Serialized against other locked writers of the same key.
    pub fn put(&self, key: K, value: impl Into<Item<V>>)
    where
        V: PartialEq,
    {
        let item = value.into();
        self.shared
            .locks
            .with_lock(key.clone(), || self.shared.put_inner(key, item));
    }

    /// Stores a value only when the key holds none (any value counts as
    /// existing in bag modes). The callback fires only on success.
    pub fn insert_new(&self, key: K, value: impl Into<Item<V>>) -> Result<(), AlreadyExists> {
        let item = value.into();
        self.shared
            .locks
            .with_lock(key.clone(), || self.shared.insert_new_inner(key, item))
    }

    /// Read-modify-write under the key's lock. `Set` mode only.
    ///
    /// The closure receives the current value (`None` when absent) and
    /// returns the replacement, or an error to leave the cache untouched;
    /// that error is returned verbatim. A previously absent key is created
    /// with the cache's `global_ttl` unless the returned [`Item`] carries
    /// its own policy.
    ///
    /// # Panics
    ///
    /// Panics on bag and duplicate-bag caches.
    pub fn update<T, E, F>(&self, key: K, f: F) -> Result<(), E>
    where
        T: Into<Item<V>>,
        F: FnOnce(Option<&V>) -> Result<T, E>,
    {
        self.refuse_multi_value("update");
        self.shared
            .locks
            .with_lock(key.clone(), || self.shared.update_inner(key, f))
    }

    /// Like [`update`](Cache::update) but fails with
    /// [`UpdateError::NotExisting`] when the key is absent, without
    /// invoking the closure.
    ///
    /// # Panics
    ///
    /// Panics on bag and duplicate-bag caches.
    pub fn update_existing<T, E, F>(&self, key: K, f: F) -> Result<(), UpdateError<E>>
    where
        T: Into<Item<V>>,
        F: FnOnce(&V) -> Result<T, E>,
    {
        self.refuse_multi_value("update_existing");
        self.shared
            .locks
            .with_lock(key.clone(), || self.shared.update_existing_inner(key, f))
    }

    /// Removes the key and all its values. Idempotent: deleting an absent
    /// key is not an error. Fires the delete callback only when something
    /// was removed.
    pub fn delete(&self, key: K) {
        self.shared
            .locks
            .with_lock(key.clone(), || self.shared.delete_inner(&key));
    }

    /// Reschedules the key's TTL without changing its value. Returns
    /// whether the key exists.
    pub fn touch(&self, key: K) -> bool {
        self.shared
            .locks
            .with_lock(key.clone(), || self.shared.touch_inner(&key))
    }

    /// Returns the cached value, producing and storing it on a miss.
    /// `Set` mode only.
    ///
    /// The fast path is a plain lock-free `get`; only a miss takes the
    /// key's lock, re-checks, and runs `producer`. Concurrent callers of a
    /// cold key run `producer` exactly once.
    ///
    /// # Panics
    ///
    /// Panics on bag and duplicate-bag caches.
    pub fn get_or_store<T: Into<Item<V>>>(&self, key: K, producer: impl FnOnce() -> T) -> Arc<V> {
        self.refuse_multi_value("get_or_store");
        if let Some(value) = self.get(&key) {
            return value;
        }
        self.shared.locks.with_lock(key.clone(), || {
            if let Some(value) = self.shared.store.peek(&key) {
                return value;
            }
            let item = producer().into();
            let value = Arc::new(item.value);
            self.shared.store.replace_value(key.clone(), Arc::clone(&value));
            self.shared.apply_ttl(&key, item.ttl);
            self.shared.emit_update(&key, &value);
            value
        })
    }

    // -- isolated critical sections ------------------------------------------

    /// Runs `f` inside the key's critical section, waiting indefinitely
    /// for the lock. Reentrant from the same thread; independent across
    /// keys. Returns `f`'s result verbatim.
    pub fn isolated<R>(&self, key: K, f: impl FnOnce() -> R) -> R {
        self.shared.locks.with_lock(key, f)
    }

    /// Like [`isolated`](Cache::isolated) but gives up after `timeout`
    /// without entering the critical section.
    pub fn isolated_for<R>(
        &self,
        key: K,
        timeout: Duration,
        f: impl FnOnce() -> R,
    ) -> Result<R, LockTimeout> {
        self.shared.locks.with_lock_timeout(key, timeout, f)
    }

    /// Runs `f` inside the key's critical section only when the lock is
    /// free right now; fails with [`Locked`] otherwise.
    pub fn try_isolated<R>(&self, key: K, f: impl FnOnce() -> R) -> Result<R, Locked> {
        self.shared.locks.try_with_lock(key, f)
    }

    // -- dirty variants ------------------------------------------------------
    //
    // Identical semantics minus the per-key lock: for callers that can
    // prove no contention or accept races. TTL bookkeeping and callbacks
    // still run.

    pub fn dirty_put(&self, key: K, value: impl Into<Item<V>>)
    where
        V: PartialEq,
    {
        self.shared.put_inner(key, value.into());
    }

    pub fn dirty_insert_new(&self, key: K, value: impl Into<Item<V>>) -> Result<(), AlreadyExists> {
        self.shared.insert_new_inner(key, value.into())
    }

    /// # Panics
    ///
    /// Panics on bag and duplicate-bag caches.
    pub fn dirty_update<T, E, F>(&self, key: K, f: F) -> Result<(), E>
    where
        T: Into<Item<V>>,
        F: FnOnce(Option<&V>) -> Result<T, E>,
    {
        self.refuse_multi_value("dirty_update");
        self.shared.update_inner(key, f)
    }

    /// # Panics
    ///
    /// Panics on bag and duplicate-bag caches.
    pub fn dirty_update_existing<T, E, F>(&self, key: K, f: F) -> Result<(), UpdateError<E>>
    where
        T: Into<Item<V>>,
        F: FnOnce(&V) -> Result<T, E>,
    {
        self.refuse_multi_value("dirty_update_existing");
        self.shared.update_existing_inner(key, f)
    }

    pub fn dirty_delete(&self, key: K) {
        self.shared.delete_inner(&key);
    }

    pub fn dirty_touch(&self, key: K) -> bool {
        self.shared.touch_inner(&key)
    }

    /// # Panics
    ///
    /// Panics on bag and duplicate-bag caches.
    pub fn dirty_get_or_store<T: Into<Item<V>>>(
        &self,
        key: K,
        producer: impl FnOnce() -> T,
    ) -> Arc<V> {
        self.refuse_multi_value("dirty_get_or_store");
        if let Some(value) = self.get(&key) {
            return value;
        }
        let item = producer().into();
        let value = Arc::new(item.value);
        self.shared.store.replace_value(key.clone(), Arc::clone(&value));
        self.shared.apply_ttl(&key, item.ttl);
        self.shared.emit_update(&key, &value);
        value
    }

    // -- maintenance ---------------------------------------------------------

    /// Drops every entry and cancels every scheduled expiry. No per-key
    /// callbacks are emitted.
    pub fn clear(&self) {
        self.shared.store.clear();
        if let Some(wheel) = &self.shared.wheel {
            wheel.lock().clear();
        }
    }

    fn refuse_multi_value(&self, operation: &str) {
        if self.shared.store.mode().is_multi_value() {
            panic!("{operation} is not supported for bag and duplicate_bag caches");
        }
    }
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn put_inner(&self, key: K, item: Item<V>)
    where
        V: PartialEq,
    {
        let value = Arc::new(item.value);
        self.store.insert_value(key.clone(), Arc::clone(&value));
        self.apply_ttl(&key, item.ttl);
        self.emit_update(&key, &value);
    }

    fn insert_new_inner(&self, key: K, item: Item<V>) -> Result<(), AlreadyExists> {
        let value = Arc::new(item.value);
        self.store.insert_new_value(key.clone(), Arc::clone(&value))?;
        self.apply_ttl(&key, item.ttl);
        self.emit_update(&key, &value);
        Ok(())
    }

    fn update_inner<T, E, F>(&self, key: K, f: F) -> Result<(), E>
    where
        T: Into<Item<V>>,
        F: FnOnce(Option<&V>) -> Result<T, E>,
    {
        let current = self.store.peek(&key);
        let item = f(current.as_deref())?.into();
        let value = Arc::new(item.value);
        self.store.replace_value(key.clone(), Arc::clone(&value));
        self.apply_ttl(&key, item.ttl);
        self.emit_update(&key, &value);
        Ok(())
    }

    fn update_existing_inner<T, E, F>(&self, key: K, f: F) -> Result<(), UpdateError<E>>
    where
        T: Into<Item<V>>,
        F: FnOnce(&V) -> Result<T, E>,
    {
        let current = match self.store.peek(&key) {
            Some(current) => current,
            None => return Err(UpdateError::NotExisting),
        };
        let item = f(&current).map_err(UpdateError::Rejected)?.into();
        let value = Arc::new(item.value);
        self.store.replace_value(key.clone(), Arc::clone(&value));
        self.apply_ttl(&key, item.ttl);
        self.emit_update(&key, &value);
        Ok(())
    }

    fn delete_inner(&self, key: &K) {
        let Some(expiry) = self.store.remove(key) else {
            return;
        };
        if let (Some(wheel), Some(slot)) = (&self.wheel, expiry.slot) {
            wheel.lock().cancel(key, slot);
        }
        self.emit_delete(key);
    }

    fn touch_inner(&self, key: &K) -> bool {
        match self.store.expiry_of(key) {
            None => false,
            Some(_) => {
                self.reschedule_current(key);
                true
            },
        }
    }

    /// Reschedules the key as if freshly written with its current TTL.
    fn reschedule_current(&self, key: &K) {
        let Some(wheel) = &self.wheel else { return };
        let Some(expiry) = self.store.expiry_of(key) else {
            return;
        };
        if let Some(ttl) = expiry.ttl {
            let slot = wheel.lock().schedule(key.clone(), ttl, expiry.slot);
            self.store.set_expiry(key, Some(ttl), Some(slot));
        }
    }

    /// Applies a write's TTL policy to the key's wheel slot.
    fn apply_ttl(&self, key: &K, requested: Ttl) {
        let Some(wheel) = &self.wheel else { return };

        let resolved = match requested {
            Ttl::NoUpdate => return,
            Ttl::Default => self.config.default_ttl,
            Ttl::After(ttl) => Some(ttl),
            Ttl::Infinity => None,
        };
        let prior = self.store.expiry_of(key).and_then(|expiry| expiry.slot);

        match resolved {
            Some(ttl) => {
                let slot = wheel.lock().schedule(key.clone(), ttl, prior);
                self.store.set_expiry(key, Some(ttl), Some(slot));
            },
            None => {
                if let Some(prior) = prior {
                    wheel.lock().cancel(key, prior);
                }
                self.store.set_expiry(key, None, None);
            },
        }
    }

    /// One ticker round: drain the due bucket, then expire each candidate
    /// under its key's lock after confirming the slot stamp.
    fn sweep(&self) {
        let due = {
            let wheel = self.wheel.as_ref().expect("sweep without a TTL engine");
            wheel.lock().advance()
        };
        for (key, stamp) in due {
            self.locks.with_lock(key.clone(), || {
                if self.store.expire(&key, stamp) {
                    self.emit_delete(&key);
                }
            });
        }
    }

    fn emit_update(&self, key: &K, value: &Arc<V>) {
        if let Some(events) = &self.events {
            events.emit(CacheEvent::Update {
                cache: self.id,
                key: key.clone(),
                value: Arc::clone(value),
            });
        }
    }

    fn emit_delete(&self, key: &K) {
        if let Some(events) = &self.events {
            events.emit(CacheEvent::Delete {
                cache: self.id,
                key: key.clone(),
            });
        }
    }
}

fn ticker_loop<K, V>(weak: Weak<Shared<K, V>>, shutdown: Receiver<()>, tick: Duration)
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    loop {
        match shutdown.recv_timeout(tick) {
            Err(RecvTimeoutError::Timeout) => {},
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
        let Some(shared) = weak.upgrade() else { return };
        shared.sweep();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{CacheBuilder, TtlCheck};

    fn cache() -> Cache<&'static str, i32> {
        CacheBuilder::new()
            .ttl_check_interval(TtlCheck::Disabled)
            .build()
            .unwrap()
    }

    fn bag_cache(mode: Mode) -> Cache<&'static str, i32> {
        CacheBuilder::new()
            .ttl_check_interval(TtlCheck::Disabled)
            .mode(mode)
            .build()
            .unwrap()
    }

    #[test]
    fn put_then_get_roundtrip() {
        let cache = cache();
        cache.put("a", 1);
        assert_eq!(cache.get(&"a").as_deref(), Some(&1));
        assert_eq!(cache.get(&"missing"), None);
    }

    #[test]
    fn put_replaces_in_set_mode() {
        let cache = cache();
        cache.put("a", 1);
        cache.put("a", 2);
        assert_eq!(cache.get(&"a").as_deref(), Some(&2));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let cache = cache();
        cache.put("a", 1);
        cache.delete("a");
        assert_eq!(cache.get(&"a"), None);
        // Absent key: still fine.
        cache.delete("a");
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn insert_new_refuses_existing_key() {
        let cache = cache();
        assert_eq!(cache.insert_new("a", 1), Ok(()));
        assert_eq!(cache.insert_new("a", 2), Err(AlreadyExists));
        assert_eq!(cache.get(&"a").as_deref(), Some(&1));
    }

    #[test]
    fn update_sees_current_value() {
        let cache = cache();
        cache.put("a", 10);
        cache
            .update("a", |current| {
                assert_eq!(current, Some(&10));
                Ok::<i32, std::convert::Infallible>(11)
            })
            .unwrap();
        assert_eq!(cache.get(&"a").as_deref(), Some(&11));
    }

    #[test]
    fn update_creates_absent_key() {
        let cache = cache();
        cache
            .update("a", |current| {
                assert_eq!(current, None);
                Ok::<i32, std::convert::Infallible>(1)
            })
            .unwrap();
        assert_eq!(cache.get(&"a").as_deref(), Some(&1));
    }

    #[test]
    fn update_error_leaves_value_untouched() {
        let cache = cache();
        cache.put("a", 1);
        let result = cache.update("a", |_| Err::<i32, _>("nope"));
        assert_eq!(result, Err("nope"));
        assert_eq!(cache.get(&"a").as_deref(), Some(&1));
    }

    #[test]
    fn update_existing_requires_the_key() {
        let cache = cache();
        assert_eq!(
            cache.update_existing("a", |_| Ok::<i32, &str>(1)),
            Err(UpdateError::NotExisting)
        );

        cache.put("a", 1);
        assert_eq!(cache.update_existing("a", |v| Ok::<_, &str>(v + 1)), Ok(()));
        assert_eq!(cache.get(&"a").as_deref(), Some(&2));

        assert_eq!(
            cache.update_existing("a", |_| Err::<i32, _>("reject")),
            Err(UpdateError::Rejected("reject"))
        );
        assert_eq!(cache.get(&"a").as_deref(), Some(&2));
    }

    #[test]
    fn get_or_store_produces_once() {
        let cache = cache();
        let mut calls = 0;
        let value = cache.get_or_store("a", || {
            calls += 1;
            7
        });
        assert_eq!(*value, 7);

        let value = cache.get_or_store("a", || -> i32 { unreachable!("key is warm") });
        assert_eq!(*value, 7);
        assert_eq!(calls, 1);
    }

    #[test]
    fn bag_modes_append_values() {
        let cache = bag_cache(Mode::DuplicateBag);
        cache.put("a", 1);
        cache.put("a", 2);
        cache.put("a", 1);
        let values: Vec<i32> = cache.get_all(&"a").iter().map(|v| **v).collect();
        assert_eq!(values, vec![1, 2, 1]);
        assert_eq!(cache.size(), 3);
        // get returns the oldest value.
        assert_eq!(cache.get(&"a").as_deref(), Some(&1));
    }

    #[test]
    fn bag_insert_new_sees_any_value_as_existing() {
        let cache = bag_cache(Mode::Bag);
        cache.put("a", 1);
        assert_eq!(cache.insert_new("a", 2), Err(AlreadyExists));
    }

    #[test]
    #[should_panic(expected = "not supported for bag and duplicate_bag caches")]
    fn update_panics_on_bag_mode() {
        let cache = bag_cache(Mode::Bag);
        let _ = cache.update("a", |_| Ok::<i32, &str>(1));
    }

    #[test]
    #[should_panic(expected = "not supported for bag and duplicate_bag caches")]
    fn get_or_store_panics_on_duplicate_bag_mode() {
        let cache = bag_cache(Mode::DuplicateBag);
        let _ = cache.get_or_store("a", || 1);
    }

    #[test]
    fn dirty_variants_share_semantics() {
        let cache = cache();
        cache.dirty_put("a", 1);
        assert_eq!(cache.get(&"a").as_deref(), Some(&1));

        assert_eq!(cache.dirty_insert_new("a", 2), Err(AlreadyExists));
        assert_eq!(cache.dirty_insert_new("b", 2), Ok(()));

        cache
            .dirty_update("a", |v| Ok::<_, std::convert::Infallible>(v.unwrap() + 1))
            .unwrap();
        assert_eq!(cache.get(&"a").as_deref(), Some(&2));

        assert_eq!(
            cache.dirty_update_existing("missing", |_| Ok::<i32, &str>(0)),
            Err(UpdateError::NotExisting)
        );

        assert_eq!(*cache.dirty_get_or_store("c", || 9), 9);

        assert!(cache.dirty_touch("a"));
        assert!(!cache.dirty_touch("missing"));

        cache.dirty_delete("a");
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn touch_reports_existence() {
        let cache = cache();
        cache.put("a", 1);
        assert!(cache.touch("a"));
        assert!(!cache.touch("missing"));
    }

    #[test]
    fn isolated_returns_the_closure_result() {
        let cache = cache();
        let out = cache.isolated("k", || "result");
        assert_eq!(out, "result");
    }

    #[test]
    fn isolated_nests_reentrantly() {
        let cache = cache();
        let out = cache.isolated("k", || cache.isolated("k", || 5));
        assert_eq!(out, 5);
    }

    #[test]
    fn try_isolated_succeeds_uncontended() {
        let cache = cache();
        assert_eq!(cache.try_isolated("k", || 1), Ok(1));
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = cache();
        cache.put("a", 1);
        cache.put("b", 2);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn clones_share_the_table() {
        let cache = cache();
        let other = cache.clone();
        cache.put("a", 1);
        assert_eq!(other.get(&"a").as_deref(), Some(&1));
        assert_eq!(cache.id(), other.id());
    }

    #[test]
    fn caches_are_independent() {
        let first = cache();
        let second = cache();
        first.put("a", 1);
        second.put("b", 2);
        assert_eq!(first.get(&"b"), None);
        assert_eq!(second.get(&"a"), None);
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn metrics_track_facade_activity() {
        let cache = cache();
        cache.put("a", 1);
        let _ = cache.get(&"a");
        let _ = cache.get(&"missing");
        cache.delete("a");

        let metrics = cache.metrics();
        assert_eq!(metrics.inserts, 1);
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.removes, 1);
    }
}
