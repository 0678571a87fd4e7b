//! Process-global name registry for cache handles.
//!
//! A cache built with [`CacheBuilder::name`](crate::CacheBuilder::name) is
//! resolvable anywhere in the process through [`Cache::lookup`], so
//! components can share a cache without threading the handle through
//! every call site.
//!
//! Entries hold weak references: the registry never keeps a cache alive.
//! When the last strong handle drops, the name is reclaimed and lookups
//! fail with [`NoSuchCache`], as they do for never-registered names and
//! for lookups with mismatched key/value types.

use std::any::Any;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::cache::{Cache, Shared};
use crate::error::{ConfigError, NoSuchCache};

/// Type-erased registry slot; concrete type is `Weak<Shared<K, V>>`.
trait NamedHandle: Any + Send + Sync {
    fn is_alive(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<K, V> NamedHandle for Weak<Shared<K, V>>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn is_alive(&self) -> bool {
        self.strong_count() > 0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn table() -> &'static RwLock<FxHashMap<String, Box<dyn NamedHandle>>> {
    static TABLE: OnceLock<RwLock<FxHashMap<String, Box<dyn NamedHandle>>>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(FxHashMap::default()))
}

/// Claims `name` for the cache. A dead entry under the same name is
/// replaced; a live one is a configuration error.
pub(crate) fn register<K, V>(name: String, shared: &Arc<Shared<K, V>>) -> Result<(), ConfigError>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let mut table = table().write();
    if table.get(&name).is_some_and(|handle| handle.is_alive()) {
        return Err(ConfigError::new(format!(
            "a cache is already registered under the name `{name}`"
        )));
    }
    table.insert(name, Box::new(Arc::downgrade(shared)));
    Ok(())
}

/// Reclaims `name` if its entry is dead. Called when a named cache's last
/// handle drops; a live entry under the name belongs to a newer cache and
/// is left alone.
pub(crate) fn unregister(name: &str) {
    let mut table = table().write();
    if table.get(name).is_some_and(|handle| !handle.is_alive()) {
        table.remove(name);
    }
}

pub(crate) fn lookup<K, V>(name: &str) -> Result<Cache<K, V>, NoSuchCache>
where
    K: Eq + std::hash::Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    let table = table().read();
    let handle = table.get(name).ok_or(NoSuchCache)?;
    let weak = handle
        .as_any()
        .downcast_ref::<Weak<Shared<K, V>>>()
        .ok_or(NoSuchCache)?;
    let shared = weak.upgrade().ok_or(NoSuchCache)?;
    Ok(Cache::from_shared(shared))
}

// =============================================================================
// Tests
// =============================================================================
