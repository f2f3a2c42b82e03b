use std::collections::HashMap;

use async_trait::async_trait;

pub mod memory;
pub mod redis_cache;

pub use memory::MemoryStateCache;
pub use redis_cache::RedisStateCache;

/// Shared key-value cache holding hash entries with a TTL.
///
/// Implementations must make `put_hash_with_ttl` atomic (the value is never
/// visible without its expiry) and `delete` must report whether *this* call
/// removed the key, so exactly one of several racing deleters sees `true`.
#[async_trait]
pub trait StateCache: Send + Sync {
    async fn put_hash_with_ttl(
        &self,
        key: &str,
        fields: &HashMap<String, String>,
        ttl: chrono::Duration,
    ) -> anyhow::Result<()>;

    /// All fields of a live entry; empty when absent or expired.
    async fn get_hash(&self, key: &str) -> anyhow::Result<HashMap<String, String>>;

    async fn delete(&self, key: &str) -> anyhow::Result<bool>;

    async fn exists(&self, key: &str) -> anyhow::Result<bool>;
}
