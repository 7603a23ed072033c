//! Cache-aside store sitting in front of the record store.
//!
//! Values are opaque bytes; callers own serialization. `get` distinguishes a
//! miss (`None`) from a hit on an empty value (`Some(vec![])`).

pub mod memory;
pub mod redis_store;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

pub use memory::MemoryCache;
pub use redis_store::RedisCache;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Remove `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}
