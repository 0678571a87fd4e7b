//! Bucketed time wheel for TTL expiry.
//!
//! A fixed ring of buckets and a cursor that advances one bucket per tick.
//! Scheduling a key places it in the bucket that the cursor reaches when the
//! key's TTL elapses; draining a bucket yields the keys whose deadline is
//! due. Work per tick is proportional to the entries in one bucket, not to
//! the number of live keys.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                      TimeWheel<K>  (N = 4, P = 10ms)                 │
//!   │                                                                      │
//!   │   cursor ─────────────┐                                              │
//!   │                       ▼                                              │
//!   │   bucket[0]      bucket[1]      bucket[2]      bucket[3]             │
//!   │   ┌─────────┐    ┌─────────┐    ┌─────────┐    ┌─────────┐           │
//!   │   │ k3 r=1  │    │         │    │ k1 r=0  │    │ k2 r=0  │           │
//!   │   └─────────┘    └─────────┘    │ k4 r=2  │    └─────────┘           │
//!   │                                 └─────────┘                          │
//!   │                                                                      │
//!   │   schedule(k, ttl=25ms):                                             │
//!   │     ticks  = ceil(25 / 10) = 3                                       │
//!   │     bucket = (cursor + 3) mod 4                                      │
//!   │     rounds = (3 - 1) / 4   = 0                                       │
//!   │                                                                      │
//!   │   advance():                                                         │
//!   │     cursor = (cursor + 1) mod 4, then drain bucket[cursor]:          │
//!   │       rounds > 0  → decrement, stays for the next revolution         │
//!   │       rounds == 0 → expiry candidate (key, stamp)                    │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Concepts
//!
//! - **Rounds**: a TTL longer than one revolution is stored with a
//!   revolution counter; the key expires only when the cursor has visited
//!   its bucket `rounds + 1` times. This keeps small wheels (N of 1, 2, 4)
//!   correct for arbitrarily long TTLs.
//! - **Stamps**: every schedule gets a fresh monotone stamp, returned in
//!   the [`SlotRef`] the caller stores next to the entry. A drained
//!   candidate whose stamp no longer matches the entry's slot was
//!   rescheduled during the race window and must be dropped as a tombstone.
//! - **Single writer**: the wheel has no interior synchronization; the
//!   cache guards it with one mutex and holds it only for O(1) bookkeeping,
//!   never across per-key locks or user callbacks.
//!
//! ## Performance
//!
//! | Operation  | Time                                   |
//! |-----------|-----------------------------------------|
//! | `schedule` | O(1)                                   |
//! | `cancel`   | O(1)                                   |
//! | `advance`  | O(entries in the drained bucket)       |

use std::hash::Hash;
use std::time::Duration;

use rustc_hash::FxHashMap;

/// Back-reference from a storage entry to its wheel slot.
///
/// `bucket` locates the entry for O(1) cancellation; `stamp` identifies the
/// exact schedule so stale drain candidates can be told apart from live
/// ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    pub(crate) bucket: usize,
    pub(crate) stamp: u64,
}

#[derive(Debug)]
struct WheelEntry {
    /// Full revolutions remaining before the entry is due.
    rounds: u64,
    stamp: u64,
}

/// Bounded ring of expiry buckets.
#[derive(Debug)]
pub struct TimeWheel<K> {
    buckets: Vec<FxHashMap<K, WheelEntry>>,
    cursor: usize,
    tick: Duration,
    next_stamp: u64,
}

impl<K> TimeWheel<K>
where
    K: Eq + Hash,
{
    /// Creates a wheel with `time_size` buckets draining every `tick`.
    ///
    /// `time_size` must be at least 1 and `tick` non-zero; both are
    /// validated by the cache builder before construction.
    pub fn new(time_size: usize, tick: Duration) -> Self {
        debug_assert!(time_size >= 1);
        debug_assert!(!tick.is_zero());
        let mut buckets = Vec::with_capacity(time_size);
        buckets.resize_with(time_size, FxHashMap::default);
        Self {
            buckets,
            cursor: 0,
            tick,
            next_stamp: 0,
        }
    }

    /// The wheel's tick period.
    pub fn tick_period(&self) -> Duration {
        self.tick
    }

    /// Number of buckets in the ring.
    pub fn time_size(&self) -> usize {
        self.buckets.len()
    }

    /// Total scheduled entries across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(FxHashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schedules `key` to expire `ttl` from now, replacing `prior` if the
    /// key was already scheduled.
    ///
    /// Returns the slot the caller must store as the entry's back-reference.
    pub fn schedule(&mut self, key: K, ttl: Duration, prior: Option<SlotRef>) -> SlotRef
    where
        K: Clone,
    {
        if let Some(prior) = prior {
            self.cancel(&key, prior);
        }

        let ticks = self.ticks_for(ttl);
        let n = self.buckets.len() as u128;
        let bucket = ((self.cursor as u128 + ticks) % n) as usize;
        let rounds = ((ticks - 1) / n) as u64;

        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.buckets[bucket].insert(key, WheelEntry { rounds, stamp });
        SlotRef { bucket, stamp }
    }

    /// Removes the key's slot, ignoring a slot that was already drained or
    /// superseded by a newer schedule.
    pub fn cancel(&mut self, key: &K, slot: SlotRef) {
        let bucket = &mut self.buckets[slot.bucket];
        if bucket.get(key).map(|entry| entry.stamp) == Some(slot.stamp) {
            bucket.remove(key);
        }
    }

    /// Advances the cursor one bucket and drains it.
    ///
    /// Entries with remaining rounds are decremented and stay for the next
    /// revolution; due entries are returned as `(key, stamp)` candidates.
    /// The caller confirms each candidate against the live entry's slot
    /// stamp before deleting anything.
    pub fn advance(&mut self) -> Vec<(K, u64)> {
        self.cursor = (self.cursor + 1) % self.buckets.len();
        let drained = std::mem::take(&mut self.buckets[self.cursor]);

        let mut due = Vec::new();
        for (key, mut entry) in drained {
            if entry.rounds > 0 {
                entry.rounds -= 1;
                self.buckets[self.cursor].insert(key, entry);
            } else {
                due.push((key, entry.stamp));
            }
        }
        due
    }

    /// Drops every scheduled entry; the cursor keeps its position.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    /// TTL in whole ticks, rounded up, never less than one.
    fn ticks_for(&self, ttl: Duration) -> u128 {
        let tick = self.tick.as_nanos();
        let ttl = ttl.as_nanos();
        let ticks = (ttl + tick - 1) / tick;
        ticks.max(1)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    /// Advances until `key` is due, returning the tick count.
    fn ticks_until_due(wheel: &mut TimeWheel<&str>, key: &str, limit: usize) -> Option<usize> {
        for tick in 1..=limit {
            let due = wheel.advance();
            if due.iter().any(|(k, _)| *k == key) {
                return Some(tick);
            }
        }
        None
    }

    #[test]
    fn expires_after_ceil_ttl_over_period_ticks() {
        let mut wheel = TimeWheel::new(8, TICK);
        wheel.schedule("a", Duration::from_millis(25), None);

        // ceil(25 / 10) = 3 ticks.
        assert_eq!(ticks_until_due(&mut wheel, "a", 16), Some(3));
        assert!(wheel.is_empty());
    }

    #[test]
    fn sub_tick_ttl_rounds_up_to_one_tick() {
        let mut wheel = TimeWheel::new(4, TICK);
        wheel.schedule("a", Duration::from_millis(1), None);
        assert_eq!(ticks_until_due(&mut wheel, "a", 8), Some(1));
    }

    #[test]
    fn ttl_longer_than_one_revolution_uses_rounds() {
        // N = 2, ttl of 7 ticks: three full revolutions plus one bucket.
        let mut wheel = TimeWheel::new(2, TICK);
        wheel.schedule("a", Duration::from_millis(70), None);
        assert_eq!(ticks_until_due(&mut wheel, "a", 32), Some(7));
    }

    #[test]
    fn single_bucket_wheel_still_expires() {
        let mut wheel = TimeWheel::new(1, TICK);
        wheel.schedule("a", Duration::from_millis(40), None);
        assert_eq!(ticks_until_due(&mut wheel, "a", 16), Some(4));
    }

    #[test]
    fn reschedule_replaces_prior_slot() {
        let mut wheel = TimeWheel::new(8, TICK);
        let first = wheel.schedule("a", Duration::from_millis(10), None);
        let second = wheel.schedule("a", Duration::from_millis(50), Some(first));
        assert_ne!(first.stamp, second.stamp);
        assert_eq!(wheel.len(), 1);

        // Only the second schedule's stamp is ever drained.
        let mut drained = Vec::new();
        for _ in 0..8 {
            drained.extend(wheel.advance());
        }
        assert_eq!(drained, vec![("a", second.stamp)]);
    }

    #[test]
    fn cancel_removes_the_slot() {
        let mut wheel = TimeWheel::new(4, TICK);
        let slot = wheel.schedule("a", Duration::from_millis(20), None);
        wheel.cancel(&"a", slot);
        assert!(wheel.is_empty());
        assert_eq!(ticks_until_due(&mut wheel, "a", 8), None);
    }

    #[test]
    fn stale_cancel_leaves_newer_schedule_alone() {
        let mut wheel = TimeWheel::new(4, TICK);
        let first = wheel.schedule("a", Duration::from_millis(20), None);
        let second = wheel.schedule("a", Duration::from_millis(20), Some(first));

        // A cancel carrying the superseded slot must not remove the live one.
        wheel.cancel(&"a", first);
        assert_eq!(wheel.len(), 1);

        wheel.cancel(&"a", second);
        assert!(wheel.is_empty());
    }

    #[test]
    fn keys_in_the_same_bucket_drain_together() {
        let mut wheel = TimeWheel::new(8, TICK);
        wheel.schedule("a", Duration::from_millis(20), None);
        wheel.schedule("b", Duration::from_millis(20), None);

        assert!(wheel.advance().is_empty());
        let mut due: Vec<_> = wheel.advance().into_iter().map(|(k, _)| k).collect();
        due.sort_unstable();
        assert_eq!(due, vec!["a", "b"]);
    }
}
