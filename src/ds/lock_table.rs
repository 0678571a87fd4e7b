//! Per-key mutual exclusion with reentrancy and FIFO waiters.
//!
//! Maps arbitrary keys to lock entries so that critical sections for the
//! same key serialize while unrelated keys proceed in parallel. This is the
//! primitive behind `update`-style read-modify-write operations: a writer
//! holds the key's lock for the duration of its critical section and no
//! global cache mutex is ever taken.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                           LockTable<K>                               │
//!   │                                                                      │
//!   │   entries: Mutex<FxHashMap<K, KeyLock>>                              │
//!   │   granted: Condvar (shared by all keys)                              │
//!   │                                                                      │
//!   │   KeyLock                                                            │
//!   │   ┌────────────────────────────────────────────────────┐             │
//!   │   │ owner:   Some(token) while held, None in handover  │             │
//!   │   │ depth:   reentrant acquisitions by the owner       │             │
//!   │   │ waiters: VecDeque<ticket>  (strict FIFO)           │             │
//!   │   └────────────────────────────────────────────────────┘             │
//!   │                                                                      │
//!   │   acquire("a") ──► entry absent        → insert, enter               │
//!   │   acquire("a") ──► owner == my token   → depth += 1, enter           │
//!   │   acquire("a") ──► owner is another    → enqueue ticket, wait        │
//!   │                                                                      │
//!   │   release("a") ──► depth -= 1; at zero: owner = None,                │
//!   │                    wake waiters (head ticket claims), or drop        │
//!   │                    the entry when nobody is waiting                  │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Concepts
//!
//! - **Owner token**: a thread-local `u64` assigned on first use. Equal
//!   tokens identify the same owner, so nested acquisitions of one key from
//!   one thread increment `depth` instead of deadlocking.
//! - **FIFO handover**: waiters receive tickets; on release the entry's
//!   owner is cleared and every waiter is woken, but only the head ticket
//!   may claim ownership. A `try` acquisition never barges past waiters.
//! - **Scoped release**: the critical section runs under an RAII guard, so
//!   the lock is released on every exit path including panics.
//! - **Reclamation**: an entry lives only while held or contended; the last
//!   release with an empty waiter queue removes it from the map.
//!
//! ## Performance
//!
//! | Operation             | Cost                                          |
//! |-----------------------|-----------------------------------------------|
//! | uncontended acquire   | one map lock + one insert                     |
//! | reentrant acquire     | one map lock + depth bump                     |
//! | contended acquire     | enqueue + condvar wait(s)                     |
//! | release               | one map lock + notify when waiters exist      |
//!
//! The table mutex is held only for bookkeeping, never across a caller's
//! critical section.

use std::collections::VecDeque;
use std::collections::hash_map::Entry;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::error::{Locked, LockTimeout};

static NEXT_OWNER_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static OWNER_TOKEN: u64 = NEXT_OWNER_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Returns the calling thread's owner token.
fn current_owner() -> u64 {
    OWNER_TOKEN.with(|token| *token)
}

#[derive(Debug)]
struct KeyLock {
    /// Holder's owner token; `None` while ownership is being handed over.
    owner: Option<u64>,
    /// Reentrant acquisition depth of the current owner.
    depth: u32,
    /// Tickets of pending acquisitions in arrival order.
    waiters: VecDeque<u64>,
}

/// Per-key lock manager.
///
/// Locks are independent across keys; a single entry map and a single
/// condvar serve every key, with per-key state kept in [`KeyLock`] entries.
#[derive(Debug)]
pub struct LockTable<K> {
    entries: Mutex<FxHashMap<K, KeyLock>>,
    granted: Condvar,
    next_ticket: AtomicU64,
}

impl<K> LockTable<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            granted: Condvar::new(),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Runs `f` under the key's lock, waiting indefinitely for the grant.
    ///
    /// Reentrant: if the calling thread already holds the key, the depth is
    /// incremented and `f` runs immediately.
    pub fn with_lock<R>(&self, key: K, f: impl FnOnce() -> R) -> R {
        self.acquire(key.clone(), None)
            .expect("untimed acquire cannot time out");
        let _release = ReleaseGuard { table: self, key };
        f()
    }

    /// Runs `f` under the key's lock if it can be granted immediately.
    ///
    /// Fails with [`Locked`] when another owner holds the key or waiters
    /// are queued; never fails for a reentrant acquisition.
    pub fn try_with_lock<R>(&self, key: K, f: impl FnOnce() -> R) -> Result<R, Locked> {
        let me = current_owner();
        {
            let mut entries = self.entries.lock();
            match entries.entry(key.clone()) {
                Entry::Vacant(vacant) => {
                    vacant.insert(KeyLock {
                        owner: Some(me),
                        depth: 1,
                        waiters: VecDeque::new(),
                    });
                },
                Entry::Occupied(mut occupied) => {
                    let lock = occupied.get_mut();
                    if lock.owner != Some(me) {
                        return Err(Locked);
                    }
                    lock.depth += 1;
                },
            }
        }
        let _release = ReleaseGuard { table: self, key };
        Ok(f())
    }

    /// Runs `f` under the key's lock, waiting at most `timeout` for the
    /// grant.
    ///
    /// On expiry the caller's ticket is withdrawn from the waiter queue and
    /// `f` is never invoked.
    pub fn with_lock_timeout<R>(
        &self,
        key: K,
        timeout: Duration,
        f: impl FnOnce() -> R,
    ) -> Result<R, LockTimeout> {
        self.acquire(key.clone(), Some(Instant::now() + timeout))?;
        let _release = ReleaseGuard { table: self, key };
        Ok(f())
    }

    /// Number of keys with a live lock entry (held or contended).
    pub fn contended_keys(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the key's lock is currently held by any owner.
    pub fn is_locked(&self, key: &K) -> bool {
        self.entries
            .lock()
            .get(key)
            .map(|lock| lock.owner.is_some())
            .unwrap_or(false)
    }

    fn acquire(&self, key: K, deadline: Option<Instant>) -> Result<(), LockTimeout> {
        let me = current_owner();
        let mut entries = self.entries.lock();

        let ticket = match entries.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(KeyLock {
                    owner: Some(me),
                    depth: 1,
                    waiters: VecDeque::new(),
                });
                return Ok(());
            },
            Entry::Occupied(mut occupied) => {
                let lock = occupied.get_mut();
                if lock.owner == Some(me) {
                    lock.depth += 1;
                    return Ok(());
                }
                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                lock.waiters.push_back(ticket);
                ticket
            },
        };

        loop {
            let timed_out = match deadline {
                Some(deadline) => self.granted.wait_until(&mut entries, deadline).timed_out(),
                None => {
                    self.granted.wait(&mut entries);
                    false
                },
            };

            let lock = entries
                .get_mut(&key)
                .expect("lock entry vanished while waiters were queued");
            if lock.owner.is_none() && lock.waiters.front() == Some(&ticket) {
                lock.waiters.pop_front();
                lock.owner = Some(me);
                lock.depth = 1;
                return Ok(());
            }

            if timed_out {
                lock.waiters.retain(|&w| w != ticket);
                let orphaned = lock.owner.is_none();
                let drained = lock.waiters.is_empty();
                if orphaned && drained {
                    entries.remove(&key);
                } else if orphaned {
                    // Another waiter may now be at the head.
                    self.granted.notify_all();
                }
                return Err(LockTimeout);
            }
        }
    }

    fn release(&self, key: &K) {
        let mut entries = self.entries.lock();
        let lock = entries
            .get_mut(key)
            .expect("released a key that holds no lock entry");
        debug_assert!(lock.owner == Some(current_owner()));

        lock.depth -= 1;
        if lock.depth > 0 {
            return;
        }

        lock.owner = None;
        let drained = lock.waiters.is_empty();
        if drained {
            entries.remove(key);
        } else {
            self.granted.notify_all();
        }
    }
}

/// Releases the key on drop so panics inside the critical section unwind
/// cleanly and wake the next waiter.
struct ReleaseGuard<'a, K: Eq + Hash + Clone> {
    table: &'a LockTable<K>,
    key: K,
}

impl<K: Eq + Hash + Clone> Drop for ReleaseGuard<'_, K> {
    fn drop(&mut self) {
        self.table.release(&self.key);
    }
}

// =============================================================================
// Tests
// =============================================================================
