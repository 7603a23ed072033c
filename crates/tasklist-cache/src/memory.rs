use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::CacheStore;

#[derive(Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-process cache backed by a `DashMap`, shared by every request task.
///
/// TTLs are honoured lazily on read. Call [`MemoryCache::evict_expired`]
/// periodically to bound memory.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all expired entries. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.entries.get(key) {
            if Instant::now() < entry.expires_at {
                return Ok(Some(entry.value.clone()));
            }
            // expired; a concurrent set may have replaced it by now
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.expires_at <= Instant::now());
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn set_get_delete() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", b"v1", MINUTE).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v1".to_vec()));

        cache.set("k", b"v2", MINUTE).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v2".to_vec()));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);

        // deleting again is fine
        cache.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn empty_value_is_a_hit() {
        let cache = MemoryCache::new();
        cache.set("empty", b"", MINUTE).await.unwrap();
        assert_eq!(cache.get("empty").await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn expired_entries_read_as_miss() {
        let cache = MemoryCache::new();
        cache.set("short", b"x", Duration::from_millis(10)).await.unwrap();
        cache.set("long", b"y", MINUTE).await.unwrap();

        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("long").await.unwrap(), Some(b"y".to_vec()));
    }

    #[tokio::test]
    async fn expired_read_only_removes_stale_entries() {
        let cache = MemoryCache::new();
        cache.set("k", b"old", Duration::from_millis(5)).await.unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());

        // refreshed after expiry: concurrent readers must not evict it
        cache.set("k", b"new", MINUTE).await.unwrap();
        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get("k").await.unwrap() })
            })
            .collect();
        for reader in readers {
            assert_eq!(reader.await.unwrap(), Some(b"new".to_vec()));
        }
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn evict_expired_drops_only_stale_entries() {
        let cache = MemoryCache::new();
        cache.set("a", b"1", Duration::from_millis(5)).await.unwrap();
        cache.set("b", b"2", Duration::from_millis(5)).await.unwrap();
        cache.set("c", b"3", MINUTE).await.unwrap();

        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.evict_expired(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let cache = MemoryCache::new();
        let other = cache.clone();
        cache.set("shared", b"1", MINUTE).await.unwrap();
        assert_eq!(other.get("shared").await.unwrap(), Some(b"1".to_vec()));
    }
}
