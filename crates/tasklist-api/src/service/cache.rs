use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use tasklist_cache::CacheStore;

pub const CACHE_NAMESPACE: &str = "tasklist";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Cache keys, one per list-query shape and parameter set.
pub mod keys {
    use super::CACHE_NAMESPACE;

    pub fn all_todos() -> String {
        format!("{CACHE_NAMESPACE}:todos:all")
    }

    pub fn user_todos(user_id: i64) -> String {
        format!("{CACHE_NAMESPACE}:todos:user:{user_id}")
    }

    pub fn all_users() -> String {
        format!("{CACHE_NAMESPACE}:users:all")
    }
}

/// Read-through JSON cache for list queries.
#[derive(Clone)]
pub struct ListCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ListCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Serve `key` from the cache, or run `load` against the record store and
    /// populate the cache with its result.
    pub async fn get_or_load<T, F>(&self, key: &str, load: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let cached = self
            .store
            .get(key)
            .await
            .with_context(|| format!("cache get {key}"))?;

        if let Some(bytes) = cached {
            match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    debug!("Cache hit for {}", key);
                    return Ok(value);
                }
                Err(e) => warn!("Discarding unreadable cache entry {}: {}", key, e),
            }
        }

        debug!("Cache miss for {}", key);
        let value = super::blocking(load).await?;

        let bytes = serde_json::to_vec(&value)?;
        self.store
            .set(key, &bytes, self.ttl)
            .await
            .with_context(|| format!("cache set {key}"))?;

        Ok(value)
    }

    /// Delete every key; the first failure aborts and is returned.
    pub async fn invalidate(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.store
                .delete(key)
                .await
                .with_context(|| format!("cache invalidation of {key} failed"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tasklist_cache::MemoryCache;

    #[test]
    fn keys_are_namespaced_and_scoped_by_user() {
        assert_eq!(keys::all_todos(), "tasklist:todos:all");
        assert_eq!(keys::user_todos(3), "tasklist:todos:user:3");
        assert_ne!(keys::user_todos(3), keys::user_todos(4));
        assert_ne!(keys::user_todos(3), keys::all_todos());
        assert_eq!(keys::all_users(), "tasklist:users:all");
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = ListCache::new(Arc::new(MemoryCache::new()), DEFAULT_CACHE_TTL);
        let loads = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let loads = loads.clone();
            let value: Vec<i64> = cache
                .get_or_load("k", move || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cached_empty_list_is_a_hit() {
        let cache = ListCache::new(Arc::new(MemoryCache::new()), DEFAULT_CACHE_TTL);
        let loads = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let loads = loads.clone();
            let value: Vec<i64> = cache
                .get_or_load("empty", move || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::new())
                })
                .await
                .unwrap();
            assert!(value.is_empty());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreadable_entry_falls_back_to_store() {
        let store = Arc::new(MemoryCache::new());
        store.set("k", b"{not json", DEFAULT_CACHE_TTL).await.unwrap();

        let cache = ListCache::new(store.clone(), DEFAULT_CACHE_TTL);
        let value: Vec<i64> = cache.get_or_load("k", || Ok(vec![9])).await.unwrap();
        assert_eq!(value, vec![9]);
        assert_eq!(store.get("k").await.unwrap(), Some(b"[9]".to_vec()));
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache = ListCache::new(Arc::new(MemoryCache::new()), DEFAULT_CACHE_TTL);
        let _: Vec<i64> = cache.get_or_load("k", || Ok(vec![1])).await.unwrap();

        cache.invalidate(&["k".to_string()]).await.unwrap();

        let value: Vec<i64> = cache.get_or_load("k", || Ok(vec![2])).await.unwrap();
        assert_eq!(value, vec![2]);
    }
}
