use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::Serialize;

use super::parse_ts;

/// Stored OAuth credential for one advertiser account on the platform.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::advertiser_credentials)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AdvertiserCredential {
    #[serde(skip)]
    pub id: i64,
    pub advertiser_id: i64,
    #[serde(skip)]
    pub access_token: Option<String>,
    #[serde(skip)]
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<String>,
    pub refresh_token_expires_at: Option<String>,
    pub last_sync_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AdvertiserCredential {
    /// Linked means both tokens are present and non-empty.
    pub fn is_linked(&self) -> bool {
        matches!(
            (self.access_token.as_deref(), self.refresh_token.as_deref()),
            (Some(a), Some(r)) if !a.is_empty() && !r.is_empty()
        )
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token_expires_at.as_deref().and_then(parse_ts)
    }

    /// True once `now` is within `skew` of expiry. A missing or unreadable
    /// expiry counts as expired.
    pub fn needs_refresh(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        match self.expires_at() {
            Some(exp) => exp - skew <= now,
            None => true,
        }
    }
}

/// Token material written when a credential is linked or rotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::advertiser_credentials)]
pub struct NewCredential<'a> {
    pub advertiser_id: i64,
    pub access_token: Option<&'a str>,
    pub refresh_token: Option<&'a str>,
    pub token_expires_at: Option<&'a str>,
    pub refresh_token_expires_at: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}
