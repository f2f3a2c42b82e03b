use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    admin_user::{AdminStatus, AdminUser},
    credential::{AdvertiserCredential, CredentialTokens},
};

pub mod sqlite;

#[async_trait]
pub trait CredentialsRepo: Send + Sync {
    async fn find(&self, advertiser_id: i64) -> anyhow::Result<Option<AdvertiserCredential>>;
    /// Insert or overwrite the credential for `advertiser_id`.
    async fn upsert_linked(&self, advertiser_id: i64, tokens: &CredentialTokens, now: DateTime<Utc>) -> anyhow::Result<()>;
    /// Single UPDATE of all token columns. Returns false when no row exists.
    async fn replace_tokens(&self, advertiser_id: i64, tokens: &CredentialTokens, now: DateTime<Utc>) -> anyhow::Result<bool>;
    async fn clear_tokens(&self, advertiser_id: i64, now: DateTime<Utc>) -> anyhow::Result<bool>;
    /// Linked credentials whose access token expires at or before `before`,
    /// including those with an unreadable expiry.
    async fn list_expiring(&self, before: DateTime<Utc>) -> anyhow::Result<Vec<AdvertiserCredential>>;
}

pub struct NewAdminRecord {
    pub username: String,
    pub password_hash: String,
    pub nickname: String,
    pub role_id: i64,
    pub role_key: String,
    pub data_scope: String,
    pub status: AdminStatus,
}

#[async_trait]
pub trait AdminUsersRepo: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<AdminUser>>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<AdminUser>>;
    async fn create(&self, record: NewAdminRecord, now: DateTime<Utc>) -> anyhow::Result<AdminUser>;
    async fn update_password(&self, id: i64, password_hash: &str, now: DateTime<Utc>) -> anyhow::Result<bool>;
    async fn set_status(&self, id: i64, status: AdminStatus, now: DateTime<Utc>) -> anyhow::Result<bool>;
    async fn record_login(&self, id: i64, now: DateTime<Utc>) -> anyhow::Result<()>;
}
