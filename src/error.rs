//! Error types for the lockcache library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when cache configuration parameters are
//!   invalid (e.g. a missing `ttl_check_interval`, zero `time_size`).
//! - [`AlreadyExists`]: Returned by `insert_new` when the key already holds
//!   a value.
//! - [`Locked`]: Returned by `try_isolated` when another owner currently
//!   holds the per-key lock.
//! - [`LockTimeout`]: Returned by `isolated_for` when the lock was not
//!   granted within the deadline.
//! - [`UpdateError`]: Returned by `update_existing`, distinguishing an
//!   absent key from a rejection by the caller's closure.
//! - [`NoSuchCache`]: Returned by registry lookups that resolve to nothing.
//!
//! Logical-absence conditions are always *returned*; they are part of the
//! normal protocol of the cache. Programming errors (calling `update` on a
//! bag-mode cache) panic instead; see [`crate::cache`].
//!
//! ## Example Usage
//!
//! ```
//! use lockcache::error::AlreadyExists;
//! use lockcache::{CacheBuilder, TtlCheck};
//!
//! let cache = CacheBuilder::<&str, i32>::new()
//!     .ttl_check_interval(TtlCheck::Disabled)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(cache.insert_new("k", 1), Ok(()));
//! assert_eq!(cache.insert_new("k", 2), Err(AlreadyExists));
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`CacheBuilder::build`](crate::builder::CacheBuilder::build).
/// Carries a human-readable description of which parameter failed
/// validation.
///
/// # Example
///
/// ```
/// use lockcache::CacheBuilder;
///
/// // ttl_check_interval must always be supplied explicitly.
/// let err = CacheBuilder::<u64, u64>::new().build().unwrap_err();
/// assert!(err.to_string().contains("ttl_check_interval"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Logical-absence results
// ---------------------------------------------------------------------------

/// Error returned by `insert_new` when the key already holds a value.
///
/// In bag and duplicate-bag modes "exists" means *any* value is present for
/// the key, not that the exact `(key, value)` pair is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyExists;

impl fmt::Display for AlreadyExists {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("key already exists")
    }
}

impl std::error::Error for AlreadyExists {}

/// Error returned by `try_isolated` when the per-key lock is held by
/// another owner.
///
/// Reentrant acquisition by the *same* owner never produces this error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locked;

impl fmt::Display for Locked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("lock is held by another owner")
    }
}

impl std::error::Error for Locked {}

/// Error returned by `isolated_for` when the per-key lock was not granted
/// within the timeout.
///
/// The caller's critical section is never entered when this is returned,
/// and the caller leaves no residue in the waiter queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeout;

impl fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("timed out waiting for the per-key lock")
    }
}

impl std::error::Error for LockTimeout {}

/// Error returned by registry lookups for names that resolve to nothing.
///
/// Produced when the name was never registered, when the cache behind it
/// has been dropped, or when it was registered with different key/value
/// types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoSuchCache;

impl fmt::Display for NoSuchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("no cache is registered under this name")
    }
}

impl std::error::Error for NoSuchCache {}

// ---------------------------------------------------------------------------
// UpdateError
// ---------------------------------------------------------------------------

/// Error returned by `update_existing` and `dirty_update_existing`.
///
/// `NotExisting` is produced without invoking the caller's closure;
/// `Rejected` wraps the closure's own error verbatim, with nothing mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError<E> {
    /// The key is absent from the cache.
    NotExisting,
    /// The update closure returned an error; the stored value is untouched.
    Rejected(E),
}

impl<E: fmt::Display> fmt::Display for UpdateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateError::NotExisting => f.write_str("key does not exist"),
            UpdateError::Rejected(e) => write!(f, "update rejected: {}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for UpdateError<E> {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
