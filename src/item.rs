//! Value wrapper carrying a per-call TTL policy.
//!
//! Every write operation on the cache accepts either a raw value or an
//! [`Item`] pairing the value with a [`Ttl`]. A raw value converts into an
//! `Item` with [`Ttl::Default`], which resolves to the cache's configured
//! `global_ttl` at write time.
//!
//! ## TTL resolution
//!
//! ```text
//!   write(key, item)
//!        │
//!        ▼
//!   ┌───────────────────────────────────────────────────────────────┐
//!   │ item.ttl                                                      │
//!   │   Default     → use the cache's global_ttl                    │
//!   │   After(d)    → (re)schedule expiry d from now                │
//!   │   Infinity    → never expire; cancel any existing schedule    │
//!   │   NoUpdate    → keep the entry's existing deadline untouched  │
//!   └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! `NoUpdate` on a key with no prior deadline leaves the key unscheduled.
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//! use lockcache::{Item, Ttl};
//!
//! // Expire 5 seconds from the write, regardless of the cache default.
//! let item = Item::new("session-token", Ttl::After(Duration::from_secs(5)));
//! assert_eq!(item.ttl, Ttl::After(Duration::from_secs(5)));
//!
//! // Overwrite the value but keep the original deadline.
//! let refreshed = Item::new("rotated-token", Ttl::NoUpdate);
//! assert_eq!(refreshed.value, "rotated-token");
//! ```

use std::time::Duration;

/// Expiry policy attached to a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Use the cache's configured `global_ttl`.
    Default,
    /// Expire the key this long after the write.
    After(Duration),
    /// Never expire the key.
    Infinity,
    /// Do not alter the key's existing deadline.
    NoUpdate,
}

/// A value paired with the [`Ttl`] policy to apply when it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item<V> {
    /// The value to store.
    pub value: V,
    /// Expiry policy for this write.
    pub ttl: Ttl,
}

impl<V> Item<V> {
    /// Creates an item with an explicit TTL policy.
    #[inline]
    pub fn new(value: V, ttl: Ttl) -> Self {
        Self { value, ttl }
    }
}

impl<V> From<V> for Item<V> {
    /// A raw value carries the cache's default TTL.
    #[inline]
    fn from(value: V) -> Self {
        Self {
            value,
            ttl: Ttl::Default,
        }
    }
}
