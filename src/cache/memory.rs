use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::StateCache;
use crate::clock::TimeProvider;

#[derive(Debug, Clone)]
struct Entry {
    fields: HashMap<String, String>,
    expires_at: DateTime<Utc>,
}

/// In-process cache with TTLs read from a [`TimeProvider`].
///
/// Only correct for a single instance; multi-node deployments use Redis.
#[derive(Clone)]
pub struct MemoryStateCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    clock: Arc<dyn TimeProvider>,
}

impl MemoryStateCache {
    pub fn new(clock: Arc<dyn TimeProvider>) -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())), clock }
    }

    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        let mut map = self.entries.lock().await;
        map.retain(|_, e| e.expires_at > now);
        map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StateCache for MemoryStateCache {
    async fn put_hash_with_ttl(
        &self,
        key: &str,
        fields: &HashMap<String, String>,
        ttl: chrono::Duration,
    ) -> anyhow::Result<()> {
        let now = self.clock.now();
        let mut map = self.entries.lock().await;
        // purge expired
        map.retain(|_, e| e.expires_at > now);
        let entry = map.entry(key.to_string()).or_insert_with(|| Entry {
            fields: HashMap::new(),
            expires_at: now,
        });
        entry.fields.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        entry.expires_at = now + ttl;
        Ok(())
    }

    async fn get_hash(&self, key: &str) -> anyhow::Result<HashMap<String, String>> {
        let now = self.clock.now();
        let map = self.entries.lock().await;
        Ok(map
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.fields.clone())
            .unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let now = self.clock.now();
        let mut map = self.entries.lock().await;
        Ok(matches!(map.remove(key), Some(e) if e.expires_at > now))
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let now = self.clock.now();
        let map = self.entries.lock().await;
        Ok(map.get(key).is_some_and(|e| e.expires_at > now))
    }
}
