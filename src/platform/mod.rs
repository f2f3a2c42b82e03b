//! Client side of the ad platform's OAuth token endpoints.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use crate::error::ProviderError;
use crate::models::credential::CredentialTokens;

pub mod client;

pub use client::PlatformClient;

/// Token material returned by the platform for an exchange or a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token_expires_in: i64,
    /// Advertiser accounts covered by this grant. Only set on code exchange.
    #[serde(default)]
    pub advertiser_ids: Vec<i64>,
}

impl TokenGrant {
    /// Absolute expiries for a grant received at `now`. Lifetimes that are
    /// negative or push past chrono's range are reported as an undecodable
    /// payload.
    pub fn tokens_at(&self, now: DateTime<Utc>) -> Result<CredentialTokens, ProviderError> {
        let token_expires_at = expiry_after(now, self.expires_in)?;
        let refresh_token_expires_at = match self.refresh_token_expires_in {
            0 => None,
            secs => Some(expiry_after(now, secs)?),
        };
        Ok(CredentialTokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            token_expires_at,
            refresh_token_expires_at,
        })
    }

    pub(crate) fn validate_lifetimes(&self) -> Result<(), ProviderError> {
        self.tokens_at(Utc::now()).map(|_| ())
    }
}

fn expiry_after(now: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>, ProviderError> {
    if secs < 0 {
        return Err(ProviderError::Unavailable(format!("undecodable data: negative lifetime {secs}")));
    }
    TimeDelta::try_seconds(secs)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| ProviderError::Unavailable(format!("undecodable data: lifetime {secs}s out of range")))
}

#[async_trait]
pub trait AdPlatformOAuth: Send + Sync {
    /// URL the admin's browser is sent to for consent.
    fn authorize_url(&self, state: &str) -> String;
    async fn exchange_code(&self, auth_code: &str) -> Result<TokenGrant, ProviderError>;
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;
}
