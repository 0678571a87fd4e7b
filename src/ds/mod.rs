//! Concurrency and timing data structures backing the cache.

pub mod lock_table;
pub mod time_wheel;

pub use lock_table::LockTable;
pub use time_wheel::{SlotRef, TimeWheel};
