use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::StateCache;

/// Redis-backed cache; the multiplexed connection manager reconnects on its own.
#[derive(Clone)]
pub struct RedisStateCache {
    conn: ConnectionManager,
}

impl RedisStateCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl StateCache for RedisStateCache {
    async fn put_hash_with_ttl(
        &self,
        key: &str,
        fields: &HashMap<String, String>,
        ttl: chrono::Duration,
    ) -> anyhow::Result<()> {
        if fields.is_empty() {
            return Err(anyhow::anyhow!("refusing to write empty hash for {}", key));
        }
        let items: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let mut conn = self.conn.clone();
        // MULTI/EXEC: HSET and EXPIRE land together or not at all
        let () = redis::pipe()
            .atomic()
            .hset_multiple(key, &items)
            .ignore()
            .expire(key, ttl.num_seconds())
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_hash(&self, key: &str) -> anyhow::Result<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }
}
