//! lockcache: concurrent in-process key-value cache with per-key locks and
//! time-wheel TTL expiry.
//!
//! Reads are lock-free against a sharded table; writes and user-supplied
//! update closures serialize per key without blocking unrelated keys; a
//! bucketed time wheel expires keys in O(1) amortized work per tick.
//!
//! ```
//! use std::time::Duration;
//! use lockcache::{CacheBuilder, Item, Ttl, TtlCheck};
//!
//! let cache = CacheBuilder::<String, String>::new()
//!     .ttl_check_interval(TtlCheck::Every(Duration::from_millis(100)))
//!     .global_ttl(Ttl::After(Duration::from_secs(60)))
//!     .build()
//!     .unwrap();
//!
//! cache.put("user:1".to_string(), "alice".to_string());
//! cache.put(
//!     "pin:1".to_string(),
//!     Item::new("kept forever".to_string(), Ttl::Infinity),
//! );
//! assert_eq!(cache.get(&"user:1".to_string()).as_deref().map(String::as_str), Some("alice"));
//! ```

pub mod builder;
pub mod cache;
pub mod ds;
pub mod error;
pub mod events;
pub mod item;
pub mod store;

mod registry;

pub use builder::{CacheBuilder, TtlCheck};
pub use cache::Cache;
pub use error::{AlreadyExists, ConfigError, Locked, LockTimeout, NoSuchCache, UpdateError};
pub use events::{CacheEvent, CacheId};
pub use item::{Item, Ttl};
pub use store::{CacheMetrics, Mode};
