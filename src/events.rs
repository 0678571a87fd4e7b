//! Asynchronous cache event delivery.
//!
//! Mutations publish [`CacheEvent`]s into an unbounded single-consumer
//! queue; a dedicated worker thread drains the queue and invokes the user's
//! hook. The write path only enqueues, so a slow or panicking hook never
//! extends the time a per-key lock is held. Because one worker drains the
//! queue in arrival order, events for the same key are delivered in the
//! order the mutations occurred.
//!
//! ```text
//!   put / update / delete / TTL expiry
//!        │ send (never blocks)
//!        ▼
//!   ┌───────────────────────────┐     ┌──────────────────────────────┐
//!   │ crossbeam unbounded queue │ ──► │ worker thread: hook(event)   │
//!   └───────────────────────────┘     │ (panics caught per event)    │
//!                                     └──────────────────────────────┘
//! ```
//!
//! The worker exits when the last cache handle drops the sender.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::Sender;

static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identifier of one cache instance.
///
/// Carried in every event so a hook shared between caches can tell their
/// streams apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheId(u64);

impl CacheId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Event delivered to the cache's hook.
#[derive(Debug, Clone)]
pub enum CacheEvent<K, V> {
    /// A value was written (insert or update), including `get_or_store`
    /// misses and `update` closures that produced a new value.
    Update {
        cache: CacheId,
        key: K,
        value: Arc<V>,
    },
    /// A key was removed, by an explicit delete or by TTL expiry.
    Delete { cache: CacheId, key: K },
}

/// User hook receiving cache events.
pub type EventHook<K, V> = dyn Fn(CacheEvent<K, V>) + Send + Sync;

/// Owns the queue feeding the worker thread.
///
/// Dropping the dispatcher disconnects the queue; the worker drains what
/// is left and exits.
#[derive(Debug)]
pub(crate) struct EventDispatcher<K, V> {
    sender: Sender<CacheEvent<K, V>>,
}

impl<K, V> EventDispatcher<K, V>
where
    K: Send + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn start(hook: Arc<EventHook<K, V>>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<CacheEvent<K, V>>();
        thread::Builder::new()
            .name("lockcache-events".into())
            .spawn(move || {
                for event in receiver {
                    // A panicking hook loses its event, not the stream.
                    let _ = panic::catch_unwind(AssertUnwindSafe(|| hook(event)));
                }
            })
            .expect("failed to spawn event dispatcher thread");
        Self { sender }
    }

    /// Fire-and-forget enqueue; a disconnected worker is ignored.
    pub(crate) fn emit(&self, event: CacheEvent<K, V>) {
        let _ = self.sender.send(event);
    }
}

// =============================================================================
// Tests
// =============================================================================
