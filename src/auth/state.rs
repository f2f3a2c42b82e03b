use std::collections::HashMap;
use std::sync::Arc;

use rand::RngCore;

use crate::cache::StateCache;
use crate::clock::TimeProvider;
use crate::config::STATE_TTL_MINUTES;
use crate::error::StateError;

/// Hash field holding the creation time. Stripped before data is handed back.
const CREATED_AT_FIELD: &str = "_created_at";

/// One-time CSRF state tokens for the platform authorization flow.
#[derive(Clone)]
pub struct OAuthStateStore {
    cache: Arc<dyn StateCache>,
    clock: Arc<dyn TimeProvider>,
    namespace: String,
}

impl OAuthStateStore {
    pub fn new(cache: Arc<dyn StateCache>, clock: Arc<dyn TimeProvider>, namespace: impl Into<String>) -> Self {
        Self { cache, clock, namespace: namespace.into() }
    }

    pub fn ttl() -> chrono::Duration {
        chrono::Duration::minutes(STATE_TTL_MINUTES)
    }

    fn key(&self, state: &str) -> String {
        format!("{}{}", self.namespace, state)
    }

    /// 256 random bits, hex encoded. Panics if the OS entropy source fails;
    /// there is no fallback to a weaker generator.
    pub fn generate_state(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    pub async fn save(&self, state: &str, data: &HashMap<String, String>) -> Result<(), StateError> {
        let mut fields = data.clone();
        fields.insert(CREATED_AT_FIELD.to_string(), self.clock.now().to_rfc3339());
        self.cache
            .put_hash_with_ttl(&self.key(state), &fields, Self::ttl())
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "failed to save oauth state");
                StateError::Cache(e.to_string())
            })
    }

    /// Consumes the state. Of several concurrent callers only the one whose
    /// delete removed the key gets the data back.
    pub async fn validate(&self, state: &str) -> Result<HashMap<String, String>, StateError> {
        if state.is_empty() {
            return Err(StateError::InvalidOrExpiredState);
        }
        let key = self.key(state);

        let mut data = self.cache.get_hash(&key).await.map_err(|e| {
            tracing::error!(error = ?e, "failed to read oauth state");
            StateError::Cache(e.to_string())
        })?;
        if data.is_empty() {
            return Err(StateError::InvalidOrExpiredState);
        }

        match self.cache.delete(&key).await {
            Ok(true) => {}
            // someone else consumed it between our read and delete
            Ok(false) => return Err(StateError::InvalidOrExpiredState),
            Err(e) => {
                // TTL bounds how long a failed delete leaves the state replayable
                tracing::warn!(error = ?e, "failed to delete consumed oauth state");
            }
        }

        data.remove(CREATED_AT_FIELD);
        Ok(data)
    }

    /// Non-consuming existence check. Diagnostics only; the callback path must
    /// use [`validate`](Self::validate).
    pub async fn validate_only(&self, state: &str) -> Result<bool, StateError> {
        if state.is_empty() {
            return Ok(false);
        }
        self.cache
            .exists(&self.key(state))
            .await
            .map_err(|e| StateError::Cache(e.to_string()))
    }

    pub async fn delete(&self, state: &str) -> Result<(), StateError> {
        self.cache
            .delete(&self.key(state))
            .await
            .map(|_| ())
            .map_err(|e| StateError::Cache(e.to_string()))
    }

    pub async fn generate_and_save(&self, data: &HashMap<String, String>) -> Result<String, StateError> {
        let state = self.generate_state();
        self.save(&state, data).await?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStateCache;
    use crate::clock::ManualTimeProvider;
    use async_trait::async_trait;
    use chrono::Duration;

    fn store() -> (OAuthStateStore, ManualTimeProvider, MemoryStateCache) {
        let clock = ManualTimeProvider::starting_now();
        let cache = MemoryStateCache::new(Arc::new(clock.clone()));
        let store = OAuthStateStore::new(Arc::new(cache.clone()), Arc::new(clock.clone()), "oauth:state:");
        (store, clock, cache)
    }

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn generated_state_is_256_bit_hex() {
        let (store, _, _) = store();
        let s = store.generate_state();
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(s, store.generate_state());
    }

    #[tokio::test]
    async fn validate_returns_data_exactly_once() {
        let (store, _, _) = store();
        let d = data(&[("redirect", "/dashboard")]);
        store.save("abc123", &d).await.unwrap();

        assert_eq!(store.validate("abc123").await.unwrap(), d);
        assert!(matches!(store.validate("abc123").await, Err(StateError::InvalidOrExpiredState)));
    }

    #[tokio::test]
    async fn state_expires_after_ten_minutes() {
        let (store, clock, _) = store();
        store.save("abc123", &data(&[("redirect", "/dashboard")])).await.unwrap();

        clock.advance(Duration::minutes(11));
        assert!(matches!(store.validate("abc123").await, Err(StateError::InvalidOrExpiredState)));
    }

    #[tokio::test]
    async fn state_still_valid_just_before_ttl() {
        let (store, clock, _) = store();
        store.save("abc123", &HashMap::new()).await.unwrap();

        clock.advance(Duration::minutes(9));
        assert!(store.validate("abc123").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_or_empty_state_is_rejected() {
        let (store, _, _) = store();
        assert!(matches!(store.validate("nope").await, Err(StateError::InvalidOrExpiredState)));
        assert!(matches!(store.validate("").await, Err(StateError::InvalidOrExpiredState)));
    }

    #[tokio::test]
    async fn concurrent_validations_yield_one_success() {
        let (store, _, _) = store();
        let state = store.generate_and_save(&data(&[("redirect", "/x")])).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            let state = state.clone();
            handles.push(tokio::spawn(async move { store.validate(&state).await }));
        }

        let mut ok = 0;
        let mut rejected = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StateError::InvalidOrExpiredState) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(rejected, 31);
    }

    #[tokio::test]
    async fn validate_only_does_not_consume() {
        let (store, _, _) = store();
        let state = store.generate_and_save(&HashMap::new()).await.unwrap();

        assert!(store.validate_only(&state).await.unwrap());
        assert!(store.validate_only(&state).await.unwrap());
        assert!(store.validate(&state).await.is_ok());
        assert!(!store.validate_only(&state).await.unwrap());
    }

    #[tokio::test]
    async fn delete_discards_state() {
        let (store, _, cache) = store();
        let state = store.generate_and_save(&HashMap::new()).await.unwrap();
        store.delete(&state).await.unwrap();
        assert!(cache.is_empty().await);
        assert!(store.validate(&state).await.is_err());
    }

    #[tokio::test]
    async fn keys_are_namespaced() {
        let (store, _, cache) = store();
        store.save("abc", &HashMap::new()).await.unwrap();
        assert!(cache.exists("oauth:state:abc").await.unwrap());
        assert!(!cache.exists("abc").await.unwrap());
    }

    struct FailingDelete(MemoryStateCache);

    #[async_trait]
    impl StateCache for FailingDelete {
        async fn put_hash_with_ttl(
            &self,
            key: &str,
            fields: &HashMap<String, String>,
            ttl: chrono::Duration,
        ) -> anyhow::Result<()> {
            self.0.put_hash_with_ttl(key, fields, ttl).await
        }
        async fn get_hash(&self, key: &str) -> anyhow::Result<HashMap<String, String>> {
            self.0.get_hash(key).await
        }
        async fn delete(&self, _key: &str) -> anyhow::Result<bool> {
            Err(anyhow::anyhow!("connection reset"))
        }
        async fn exists(&self, key: &str) -> anyhow::Result<bool> {
            self.0.exists(key).await
        }
    }

    #[tokio::test]
    async fn delete_failure_is_logged_not_propagated() {
        let clock = ManualTimeProvider::starting_now();
        let inner = MemoryStateCache::new(Arc::new(clock.clone()));
        let store = OAuthStateStore::new(Arc::new(FailingDelete(inner)), Arc::new(clock), "oauth:state:");
        store.save("s", &data(&[("k", "v")])).await.unwrap();

        assert_eq!(store.validate("s").await.unwrap(), data(&[("k", "v")]));
    }

    struct DownCache;

    #[async_trait]
    impl StateCache for DownCache {
        async fn put_hash_with_ttl(&self, _: &str, _: &HashMap<String, String>, _: chrono::Duration) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("connection refused"))
        }
        async fn get_hash(&self, _: &str) -> anyhow::Result<HashMap<String, String>> {
            Err(anyhow::anyhow!("connection refused"))
        }
        async fn delete(&self, _: &str) -> anyhow::Result<bool> {
            Err(anyhow::anyhow!("connection refused"))
        }
        async fn exists(&self, _: &str) -> anyhow::Result<bool> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    #[tokio::test]
    async fn cache_outage_is_reported() {
        let store = OAuthStateStore::new(Arc::new(DownCache), Arc::new(ManualTimeProvider::starting_now()), "p:");
        assert!(matches!(store.generate_and_save(&HashMap::new()).await, Err(StateError::Cache(_))));
        assert!(matches!(store.validate("abc").await, Err(StateError::Cache(_))));
    }
}
