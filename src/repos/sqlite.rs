use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::OptionalExtension;

use crate::db::sqlite::SqlitePool;
use crate::models::{
    admin_user::{AdminStatus, AdminUser, NewAdminUser},
    credential::{AdvertiserCredential, CredentialTokens, NewCredential},
    format_ts,
};
use crate::repos::{AdminUsersRepo, CredentialsRepo, NewAdminRecord};
use crate::schema::{admin_users, advertiser_credentials};

pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    pub fn new(pool: SqlitePool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

/// Owned, formatted copy of [`CredentialTokens`] that can cross into `spawn_blocking`.
struct TokenColumns {
    access_token: String,
    refresh_token: String,
    token_expires_at: String,
    refresh_token_expires_at: Option<String>,
}

impl From<&CredentialTokens> for TokenColumns {
    fn from(t: &CredentialTokens) -> Self {
        Self {
            access_token: t.access_token.clone(),
            refresh_token: t.refresh_token.clone(),
            token_expires_at: format_ts(t.token_expires_at),
            refresh_token_expires_at: t.refresh_token_expires_at.map(format_ts),
        }
    }
}

#[async_trait]
impl CredentialsRepo for SqliteRepo {
    async fn find(&self, advertiser_id: i64) -> anyhow::Result<Option<AdvertiserCredential>> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<Option<AdvertiserCredential>> {
            let mut conn = pool.get()?;
            use advertiser_credentials::dsl as ac;
            let row = ac::advertiser_credentials
                .filter(ac::advertiser_id.eq(advertiser_id))
                .select(AdvertiserCredential::as_select())
                .first(&mut conn)
                .optional()?;
            Ok(row)
        })
        .await?
    }

    async fn upsert_linked(&self, advertiser_id: i64, tokens: &CredentialTokens, now: DateTime<Utc>) -> anyhow::Result<()> {
        let pool = self.pool.clone();
        let cols = TokenColumns::from(tokens);
        let now = format_ts(now);
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut conn = pool.get()?;
            use advertiser_credentials::dsl as ac;
            diesel::insert_into(advertiser_credentials::table)
                .values(&NewCredential {
                    advertiser_id,
                    access_token: Some(&cols.access_token),
                    refresh_token: Some(&cols.refresh_token),
                    token_expires_at: Some(&cols.token_expires_at),
                    refresh_token_expires_at: cols.refresh_token_expires_at.as_deref(),
                    created_at: &now,
                    updated_at: &now,
                })
                .on_conflict(ac::advertiser_id)
                .do_update()
                .set((
                    ac::access_token.eq(&cols.access_token),
                    ac::refresh_token.eq(&cols.refresh_token),
                    ac::token_expires_at.eq(&cols.token_expires_at),
                    ac::refresh_token_expires_at.eq(cols.refresh_token_expires_at.as_deref()),
                    ac::updated_at.eq(&now),
                ))
                .execute(&mut conn)?;
            Ok(())
        })
        .await?
    }

    async fn replace_tokens(&self, advertiser_id: i64, tokens: &CredentialTokens, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let pool = self.pool.clone();
        let cols = TokenColumns::from(tokens);
        let now = format_ts(now);
        tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            let mut conn = pool.get()?;
            use advertiser_credentials::dsl as ac;
            let n = diesel::update(ac::advertiser_credentials.filter(ac::advertiser_id.eq(advertiser_id)))
                .set((
                    ac::access_token.eq(&cols.access_token),
                    ac::refresh_token.eq(&cols.refresh_token),
                    ac::token_expires_at.eq(&cols.token_expires_at),
                    ac::refresh_token_expires_at.eq(cols.refresh_token_expires_at.as_deref()),
                    ac::updated_at.eq(&now),
                ))
                .execute(&mut conn)?;
            Ok(n > 0)
        })
        .await?
    }

    async fn clear_tokens(&self, advertiser_id: i64, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let pool = self.pool.clone();
        let now = format_ts(now);
        tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            let mut conn = pool.get()?;
            use advertiser_credentials::dsl as ac;
            let n = diesel::update(ac::advertiser_credentials.filter(ac::advertiser_id.eq(advertiser_id)))
                .set((
                    ac::access_token.eq(None::<String>),
                    ac::refresh_token.eq(None::<String>),
                    ac::token_expires_at.eq(None::<String>),
                    ac::refresh_token_expires_at.eq(None::<String>),
                    ac::updated_at.eq(&now),
                ))
                .execute(&mut conn)?;
            Ok(n > 0)
        })
        .await?
    }

    async fn list_expiring(&self, before: DateTime<Utc>) -> anyhow::Result<Vec<AdvertiserCredential>> {
        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<AdvertiserCredential>> {
            let mut conn = pool.get()?;
            use advertiser_credentials::dsl as ac;
            let rows = ac::advertiser_credentials
                .filter(ac::access_token.is_not_null())
                .filter(ac::refresh_token.is_not_null())
                .order(ac::token_expires_at.asc())
                .select(AdvertiserCredential::as_select())
                .load(&mut conn)?;
            Ok(rows)
        })
        .await??;

        // Expiry is compared in Rust so rows with unreadable timestamps are included.
        Ok(rows
            .into_iter()
            .filter(|c| c.is_linked() && c.expires_at().map_or(true, |exp| exp <= before))
            .collect())
    }
}

#[async_trait]
impl AdminUsersRepo for SqliteRepo {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<AdminUser>> {
        let pool = self.pool.clone();
        let username = username.to_string();
        tokio::task::spawn_blocking(move || -> anyhow::Result<Option<AdminUser>> {
            let mut conn = pool.get()?;
            let user = admin_users::table
                .filter(admin_users::username.eq(&username))
                .select(AdminUser::as_select())
                .first(&mut conn)
                .optional()?;
            Ok(user)
        })
        .await?
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<AdminUser>> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<Option<AdminUser>> {
            let mut conn = pool.get()?;
            let user = admin_users::table
                .find(id)
                .select(AdminUser::as_select())
                .first(&mut conn)
                .optional()?;
            Ok(user)
        })
        .await?
    }

    async fn create(&self, record: NewAdminRecord, now: DateTime<Utc>) -> anyhow::Result<AdminUser> {
        let pool = self.pool.clone();
        let now = format_ts(now);
        tokio::task::spawn_blocking(move || -> anyhow::Result<AdminUser> {
            let mut conn = pool.get()?;
            let user = diesel::insert_into(admin_users::table)
                .values(&NewAdminUser {
                    username: &record.username,
                    password_hash: &record.password_hash,
                    nickname: &record.nickname,
                    role_id: record.role_id,
                    role_key: &record.role_key,
                    data_scope: &record.data_scope,
                    status: record.status.as_str(),
                    created_at: &now,
                    updated_at: &now,
                })
                .returning(AdminUser::as_returning())
                .get_result(&mut conn)?;
            Ok(user)
        })
        .await?
    }

    async fn update_password(&self, id: i64, password_hash: &str, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let pool = self.pool.clone();
        let password_hash = password_hash.to_string();
        let now = format_ts(now);
        tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            let mut conn = pool.get()?;
            let n = diesel::update(admin_users::table.find(id))
                .set((admin_users::password_hash.eq(&password_hash), admin_users::updated_at.eq(&now)))
                .execute(&mut conn)?;
            Ok(n > 0)
        })
        .await?
    }

    async fn set_status(&self, id: i64, status: AdminStatus, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let pool = self.pool.clone();
        let now = format_ts(now);
        tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
            let mut conn = pool.get()?;
            let n = diesel::update(admin_users::table.find(id))
                .set((admin_users::status.eq(status.as_str()), admin_users::updated_at.eq(&now)))
                .execute(&mut conn)?;
            Ok(n > 0)
        })
        .await?
    }

    async fn record_login(&self, id: i64, now: DateTime<Utc>) -> anyhow::Result<()> {
        let pool = self.pool.clone();
        let now = format_ts(now);
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut conn = pool.get()?;
            diesel::update(admin_users::table.find(id))
                .set((admin_users::last_login_at.eq(Some(&now)), admin_users::updated_at.eq(&now)))
                .execute(&mut conn)?;
            Ok(())
        })
        .await?
    }
}
