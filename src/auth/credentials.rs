use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use crate::models::credential::{AdvertiserCredential, CredentialTokens};
use crate::repos::CredentialsRepo;

type LockTable = HashMap<i64, Arc<tokio::sync::Mutex<()>>>;

/// Persistent advertiser credentials plus a per-advertiser lock used to
/// serialize refreshes.
pub struct AdvertiserCredentialStore {
    repo: Arc<dyn CredentialsRepo>,
    locks: Mutex<LockTable>,
}

impl AdvertiserCredentialStore {
    pub fn new(repo: Arc<dyn CredentialsRepo>) -> Self {
        Self { repo, locks: Mutex::new(HashMap::new()) }
    }

    pub async fn get(&self, advertiser_id: i64) -> anyhow::Result<Option<AdvertiserCredential>> {
        self.repo.find(advertiser_id).await
    }

    /// Linked credential, or `None` when the row is absent or its tokens are cleared.
    pub async fn get_linked(&self, advertiser_id: i64) -> anyhow::Result<Option<AdvertiserCredential>> {
        Ok(self.repo.find(advertiser_id).await?.filter(AdvertiserCredential::is_linked))
    }

    pub async fn link(&self, advertiser_id: i64, tokens: &CredentialTokens, now: DateTime<Utc>) -> anyhow::Result<()> {
        self.repo.upsert_linked(advertiser_id, tokens, now).await
    }

    /// Replaces access token, refresh token and expiry together. False if the
    /// advertiser has no row.
    pub async fn rotate(&self, advertiser_id: i64, tokens: &CredentialTokens, now: DateTime<Utc>) -> anyhow::Result<bool> {
        self.repo.replace_tokens(advertiser_id, tokens, now).await
    }

    pub async fn unlink(&self, advertiser_id: i64, now: DateTime<Utc>) -> anyhow::Result<bool> {
        self.repo.clear_tokens(advertiser_id, now).await
    }

    pub async fn expiring_before(&self, before: DateTime<Utc>) -> anyhow::Result<Vec<AdvertiserCredential>> {
        self.repo.list_expiring(before).await
    }

    /// Exclusive per-advertiser guard. Different advertisers never contend.
    pub async fn lock(&self, advertiser_id: i64) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut table = self.table();
            // Only the table holds an idle entry; guards and waiters hold clones.
            table.retain(|id, m| *id == advertiser_id || Arc::strong_count(m) > 1);
            table.entry(advertiser_id).or_default().clone()
        };
        mutex.lock_owned().await
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }
}
