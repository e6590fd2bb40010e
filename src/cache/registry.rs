//! Cache registry - one place to look up named caches.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::{CacheConfig, TypedCache};

/// Registry of named typed caches.
///
/// Components ask for their cache by name; asking twice with the same
/// types returns the same storage.
#[derive(Clone)]
pub struct CacheRegistry {
    caches: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

struct CacheEntry {
    cache: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl CacheRegistry {
    pub fn new() -> Self {
        info!("Cache registry initialized");
        Self {
            caches: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn lookup<K, V>(entry: &CacheEntry, name: &str) -> Option<TypedCache<K, V>>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let found = entry.cache.downcast_ref::<TypedCache<K, V>>().cloned();
        if found.is_none() {
            warn!(
                "Cache '{}' holds {}, not {}",
                name,
                entry.type_name,
                std::any::type_name::<TypedCache<K, V>>()
            );
        }
        found
    }

    /// Existing cache by name, or a new one built from `config`.
    ///
    /// A name already taken by a cache of other types yields a fresh,
    /// unregistered cache.
    pub fn get_or_create<K, V>(&self, name: &str, config: CacheConfig) -> TypedCache<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let mut caches = self.caches.write();

        if let Some(entry) = caches.get(name) {
            return Self::lookup(entry, name).unwrap_or_else(|| TypedCache::new(name, config));
        }

        debug!("Creating cache: {}", name);
        let cache = TypedCache::new(name, config);
        caches.insert(
            name.to_string(),
            CacheEntry {
                cache: Box::new(cache.clone()),
                type_name: std::any::type_name::<TypedCache<K, V>>(),
            },
        );

        cache
    }

    /// Drop a cache, e.g. the echo cache of a discarded session.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.caches.write().remove(name).is_some();
        if removed {
            debug!("Removed cache: {}", name);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.caches.read().len()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let caches = self.caches.read();
        f.debug_struct("CacheRegistry")
            .field("cache_count", &caches.len())
            .field("cache_names", &caches.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_returns_shared_cache() {
        let registry = CacheRegistry::new();
        let a: TypedCache<String, u32> = registry.get_or_create("n", CacheConfig::default());
        a.insert("k".into(), 7);

        let b: TypedCache<String, u32> = registry.get_or_create("n", CacheConfig::default());
        assert_eq!(b.get(&"k".to_string()), Some(7));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_type_mismatch_is_not_shared() {
        let registry = CacheRegistry::new();
        let a: TypedCache<String, u32> = registry.get_or_create("n", CacheConfig::default());
        a.insert("k".into(), 7);

        let b: TypedCache<String, String> = registry.get_or_create("n", CacheConfig::default());
        assert!(!b.contains(&"k".to_string()));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove("n"));
        assert!(!registry.remove("n"));
    }
}
