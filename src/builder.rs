//! Cache construction and configuration validation.
//!
//! Provides [`CacheBuilder`], the single entry point for creating caches.
//! Construction is fallible: misconfigured TTL options are rejected with a
//! [`ConfigError`] before any thread is spawned or table allocated.
//!
//! ## TTL configuration
//!
//! `ttl_check_interval` must always be supplied explicitly, either as a
//! tick period or as [`TtlCheck::Disabled`]. This is deliberate: a cache
//! that silently never expires because the interval defaulted to "off" is
//! a misconfiguration that should fail at startup, not in production.
//!
//! | `ttl_check_interval` | `global_ttl` | outcome                        |
//! |----------------------|--------------|--------------------------------|
//! | not supplied         | any          | error                          |
//! | `Every(p)`           | not supplied | error                          |
//! | `Disabled`           | supplied     | error                          |
//! | `Disabled`           | not supplied | ok, no TTL engine              |
//! | `Every(p)`           | supplied     | ok, ticker runs every `p`      |
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use lockcache::{CacheBuilder, Ttl, TtlCheck};
//!
//! let cache = CacheBuilder::<String, u64>::new()
//!     .ttl_check_interval(TtlCheck::Every(Duration::from_millis(100)))
//!     .global_ttl(Ttl::After(Duration::from_secs(30)))
//!     .touch_on_read(true)
//!     .time_size(8)
//!     .build()
//!     .unwrap();
//!
//! cache.put("answer".to_string(), 42);
//! assert_eq!(cache.get(&"answer".to_string()).as_deref(), Some(&42));
//! ```

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::error::ConfigError;
use crate::events::{CacheEvent, EventHook};
use crate::item::Ttl;
use crate::store::Mode;

/// Whether and how often the TTL ticker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlCheck {
    /// Advance the wheel every period.
    Every(Duration),
    /// No TTL engine; entries live until explicitly deleted.
    Disabled,
}

/// Validated, immutable cache configuration.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// Wheel tick period; `None` when TTL is disabled.
    pub tick: Option<Duration>,
    /// TTL applied to plain-value writes; `None` means never expire.
    pub default_ttl: Option<Duration>,
    pub touch_on_read: bool,
    pub time_size: usize,
    pub mode: Mode,
    pub shards: usize,
}

/// Builder for [`Cache`] instances.
pub struct CacheBuilder<K, V> {
    ttl_check_interval: Option<TtlCheck>,
    global_ttl: Option<Ttl>,
    touch_on_read: bool,
    time_size: usize,
    mode: Mode,
    shards: Option<usize>,
    name: Option<String>,
    callback: Option<Arc<EventHook<K, V>>>,
}

impl<K, V> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheBuilder<K, V> {
    pub fn new() -> Self {
        Self {
            ttl_check_interval: None,
            global_ttl: None,
            touch_on_read: false,
            time_size: 1,
            mode: Mode::Set,
            shards: None,
            name: None,
            callback: None,
        }
    }

    /// Sets the TTL ticker cadence. Mandatory; there is no default.
    pub fn ttl_check_interval(mut self, check: TtlCheck) -> Self {
        self.ttl_check_interval = Some(check);
        self
    }

    /// TTL applied to writes that don't carry their own
    /// ([`Ttl::After`] or [`Ttl::Infinity`]).
    pub fn global_ttl(mut self, ttl: Ttl) -> Self {
        self.global_ttl = Some(ttl);
        self
    }

    /// Reschedule a key's TTL on every successful read.
    pub fn touch_on_read(mut self, touch: bool) -> Self {
        self.touch_on_read = touch;
        self
    }

    /// Number of wheel buckets. More buckets spread expiry work across
    /// ticks; one bucket expires everything due in a single drain.
    pub fn time_size(mut self, buckets: usize) -> Self {
        self.time_size = buckets;
        self
    }

    /// Storage mode; defaults to [`Mode::Set`].
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Shard count hint for the storage table; defaults to the machine's
    /// available parallelism.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = Some(shards);
        self
    }

    /// Registers the cache under a process-global name resolvable with
    /// [`Cache::lookup`].
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Hook invoked asynchronously for every successful write and delete.
    pub fn callback(mut self, hook: impl Fn(CacheEvent<K, V>) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(hook));
        self
    }

    fn validated(&self) -> Result<Config, ConfigError> {
        let (tick, default_ttl) = match self.ttl_check_interval {
            None => {
                return Err(ConfigError::new("ttl_check_interval must be supplied"));
            },
            Some(TtlCheck::Every(period)) => {
                if period.is_zero() {
                    return Err(ConfigError::new(
                        "ttl_check_interval must be a positive duration",
                    ));
                }
                let default_ttl = match self.global_ttl {
                    None => return Err(ConfigError::new("global_ttl must be supplied")),
                    Some(Ttl::After(ttl)) if ttl.is_zero() => {
                        return Err(ConfigError::new("global_ttl must be a positive duration"));
                    },
                    Some(Ttl::After(ttl)) => Some(ttl),
                    Some(Ttl::Infinity) => None,
                    Some(Ttl::Default | Ttl::NoUpdate) => {
                        return Err(ConfigError::new(
                            "global_ttl must be a duration or infinity",
                        ));
                    },
                };
                (Some(period), default_ttl)
            },
            Some(TtlCheck::Disabled) => {
                if self.global_ttl.is_some() {
                    return Err(ConfigError::new(
                        "either remove your global_ttl or set ttl_check_interval to a time",
                    ));
                }
                (None, None)
            },
        };

        if self.time_size == 0 {
            return Err(ConfigError::new("time_size must be positive"));
        }
        if self.shards == Some(0) {
            return Err(ConfigError::new("shards must be positive"));
        }

        Ok(Config {
            tick,
            default_ttl,
            touch_on_read: self.touch_on_read,
            time_size: self.time_size,
            mode: self.mode,
            shards: self.shards.unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|count| count.get())
                    .unwrap_or(1)
            }),
        })
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Validates the configuration and constructs the cache, spawning the
    /// ticker and event dispatcher threads as configured.
    pub fn build(self) -> Result<Cache<K, V>, ConfigError> {
        let config = self.validated()?;
        Cache::from_config(config, self.callback, self.name)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> CacheBuilder<u64, u64> {
        CacheBuilder::new()
    }

    // -- the TTL validation table -----------------------------------------

    #[test]
    fn missing_interval_is_rejected() {
        let err = builder().build().unwrap_err();
        assert_eq!(err.message(), "ttl_check_interval must be supplied");
    }

    #[test]
    fn missing_interval_with_global_ttl_is_rejected() {
        let err = builder()
            .global_ttl(Ttl::After(Duration::from_millis(50)))
            .build()
            .unwrap_err();
        assert_eq!(err.message(), "ttl_check_interval must be supplied");
    }

    #[test]
    fn interval_without_global_ttl_is_rejected() {
        let err = builder()
            .ttl_check_interval(TtlCheck::Every(Duration::from_millis(10)))
            .build()
            .unwrap_err();
        assert_eq!(err.message(), "global_ttl must be supplied");
    }

    #[test]
    fn disabled_interval_with_global_ttl_is_rejected() {
        let err = builder()
            .ttl_check_interval(TtlCheck::Disabled)
            .global_ttl(Ttl::After(Duration::from_millis(50)))
            .build()
            .unwrap_err();
        assert_eq!(
            err.message(),
            "either remove your global_ttl or set ttl_check_interval to a time"
        );
    }

    #[test]
    fn disabled_interval_without_global_ttl_builds_without_engine() {
        let cache = builder()
            .ttl_check_interval(TtlCheck::Disabled)
            .build()
            .unwrap();
        assert!(!cache.ttl_enabled());
    }

    #[test]
    fn interval_with_global_ttl_builds_with_engine() {
        let cache = builder()
            .ttl_check_interval(TtlCheck::Every(Duration::from_millis(10)))
            .global_ttl(Ttl::After(Duration::from_millis(50)))
            .build()
            .unwrap();
        assert!(cache.ttl_enabled());
    }

    #[test]
    fn infinite_global_ttl_is_accepted() {
        let cache = builder()
            .ttl_check_interval(TtlCheck::Every(Duration::from_millis(10)))
            .global_ttl(Ttl::Infinity)
            .build()
            .unwrap();
        assert!(cache.ttl_enabled());
    }

    // -- other parameter validation ----------------------------------------

    #[test]
    fn zero_interval_is_rejected() {
        let err = builder()
            .ttl_check_interval(TtlCheck::Every(Duration::ZERO))
            .global_ttl(Ttl::Infinity)
            .build()
            .unwrap_err();
        assert!(err.message().contains("positive"));
    }

    #[test]
    fn zero_global_ttl_is_rejected() {
        let err = builder()
            .ttl_check_interval(TtlCheck::Every(Duration::from_millis(10)))
            .global_ttl(Ttl::After(Duration::ZERO))
            .build()
            .unwrap_err();
        assert!(err.message().contains("global_ttl"));
    }

    #[test]
    fn marker_ttls_are_rejected_as_global_ttl() {
        for marker in [Ttl::Default, Ttl::NoUpdate] {
            let err = builder()
                .ttl_check_interval(TtlCheck::Every(Duration::from_millis(10)))
                .global_ttl(marker)
                .build()
                .unwrap_err();
            assert_eq!(err.message(), "global_ttl must be a duration or infinity");
        }
    }

    #[test]
    fn zero_time_size_is_rejected() {
        let err = builder()
            .ttl_check_interval(TtlCheck::Disabled)
            .time_size(0)
            .build()
            .unwrap_err();
        assert_eq!(err.message(), "time_size must be positive");
    }

    #[test]
    fn zero_shards_are_rejected() {
        let err = builder()
            .ttl_check_interval(TtlCheck::Disabled)
            .shards(0)
            .build()
            .unwrap_err();
        assert_eq!(err.message(), "shards must be positive");
    }
}
