use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::auth::credentials::AdvertiserCredentialStore;
use crate::auth::state::OAuthStateStore;
use crate::clock::TimeProvider;
use crate::config::PlatformCfg;
use crate::error::{CredentialError, ProviderError};
use crate::platform::{AdPlatformOAuth, TokenGrant};

pub const REDIRECT_URL_KEY: &str = "redirect_url";

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest {
    pub auth_url: String,
    pub state: String,
}

#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub advertiser_ids: Vec<i64>,
    /// Data saved alongside the state, e.g. the frontend redirect target.
    pub state_data: HashMap<String, String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub scanned: usize,
    pub refreshed: usize,
    pub revoked: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// Upper bound on every call to the platform.
    pub provider_timeout: Duration,
    /// A token this close to expiry is refreshed before use.
    pub refresh_skew: chrono::Duration,
}

impl OrchestratorSettings {
    pub fn from_cfg(cfg: &PlatformCfg) -> Self {
        Self { provider_timeout: cfg.timeout(), refresh_skew: cfg.refresh_skew() }
    }
}

/// Drives the advertiser link lifecycle: authorize, exchange, refresh, unlink.
pub struct AuthorizationOrchestrator {
    states: OAuthStateStore,
    credentials: AdvertiserCredentialStore,
    platform: Arc<dyn AdPlatformOAuth>,
    clock: Arc<dyn TimeProvider>,
    settings: OrchestratorSettings,
}

impl AuthorizationOrchestrator {
    pub fn new(
        states: OAuthStateStore,
        credentials: AdvertiserCredentialStore,
        platform: Arc<dyn AdPlatformOAuth>,
        clock: Arc<dyn TimeProvider>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self { states, credentials, platform, clock, settings }
    }

    pub async fn begin_authorization(&self, redirect_url: &str) -> Result<AuthorizationRequest, CredentialError> {
        let data = HashMap::from([(REDIRECT_URL_KEY.to_string(), redirect_url.to_string())]);
        let state = self.states.generate_and_save(&data).await?;
        let auth_url = self.platform.authorize_url(&state);
        Ok(AuthorizationRequest { auth_url, state })
    }

    /// Consumes `state` before the code is exchanged, so a replayed callback
    /// never reaches the platform.
    pub async fn complete_authorization(&self, state: &str, auth_code: &str) -> Result<LinkOutcome, CredentialError> {
        let state_data = self.states.validate(state).await?;

        let grant = self.call_platform(self.platform.exchange_code(auth_code)).await?;
        if grant.advertiser_ids.is_empty() {
            tracing::warn!("authorization grant covers no advertisers");
        }

        let now = self.clock.now();
        let tokens = grant.tokens_at(now)?;
        for &advertiser_id in &grant.advertiser_ids {
            let _guard = self.credentials.lock(advertiser_id).await;
            self.credentials.link(advertiser_id, &tokens, now).await?;
            tracing::info!(advertiser_id, "advertiser linked");
        }

        Ok(LinkOutcome { advertiser_ids: grant.advertiser_ids, state_data })
    }

    /// A usable access token for `advertiser_id`, refreshing it first if it is
    /// within the skew of expiry.
    pub async fn resolve(&self, advertiser_id: i64) -> Result<String, CredentialError> {
        let credential = self
            .credentials
            .get_linked(advertiser_id)
            .await?
            .ok_or(CredentialError::NotLinked(advertiser_id))?;

        if !credential.needs_refresh(self.clock.now(), self.settings.refresh_skew) {
            if let Some(token) = credential.access_token {
                return Ok(token);
            }
        }
        self.refresh_locked(advertiser_id, Some(self.settings.refresh_skew)).await
    }

    /// Refreshes regardless of the current expiry.
    pub async fn force_refresh(&self, advertiser_id: i64) -> Result<String, CredentialError> {
        self.refresh_locked(advertiser_id, None).await
    }

    pub async fn unlink(&self, advertiser_id: i64) -> Result<(), CredentialError> {
        let _guard = self.credentials.lock(advertiser_id).await;
        if !self.credentials.unlink(advertiser_id, self.clock.now()).await? {
            return Err(CredentialError::NotLinked(advertiser_id));
        }
        tracing::info!(advertiser_id, "advertiser unlinked");
        Ok(())
    }

    /// Refreshes every linked credential that expires within `window`.
    /// Individual failures are counted, not returned.
    pub async fn refresh_expiring(&self, window: chrono::Duration) -> Result<RefreshSummary, CredentialError> {
        let due = self.credentials.expiring_before(self.clock.now() + window).await?;
        let mut summary = RefreshSummary { scanned: due.len(), ..RefreshSummary::default() };

        for credential in due {
            let advertiser_id = credential.advertiser_id;
            match self.refresh_locked(advertiser_id, Some(window)).await {
                Ok(_) => summary.refreshed += 1,
                Err(CredentialError::CredentialRevoked(_)) => summary.revoked += 1,
                // unlinked by someone else since the scan
                Err(CredentialError::NotLinked(_)) => {}
                Err(e) => {
                    tracing::warn!(advertiser_id, error = %e, "scheduled token refresh failed");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Refresh under the advertiser lock. With `Some(threshold)` the credential
    /// is re-read after the lock is taken and left alone if another task already
    /// pushed its expiry past the threshold.
    async fn refresh_locked(
        &self,
        advertiser_id: i64,
        threshold: Option<chrono::Duration>,
    ) -> Result<String, CredentialError> {
        let _guard = self.credentials.lock(advertiser_id).await;

        let credential = self
            .credentials
            .get_linked(advertiser_id)
            .await?
            .ok_or(CredentialError::NotLinked(advertiser_id))?;
        let (Some(access_token), Some(refresh_token)) = (credential.access_token.clone(), credential.refresh_token.clone())
        else {
            return Err(CredentialError::NotLinked(advertiser_id));
        };

        if let Some(threshold) = threshold {
            if !credential.needs_refresh(self.clock.now(), threshold) {
                return Ok(access_token);
            }
        }

        let grant = match self.call_platform(self.platform.refresh_token(&refresh_token)).await {
            Ok(grant) => grant,
            Err(ProviderError::Rejected { code, message }) => {
                tracing::warn!(advertiser_id, code, %message, "refresh token rejected, unlinking advertiser");
                self.credentials.unlink(advertiser_id, self.clock.now()).await?;
                return Err(CredentialError::CredentialRevoked(advertiser_id));
            }
            Err(e) => {
                tracing::warn!(advertiser_id, error = %e, "token refresh failed");
                return Err(e.into());
            }
        };

        let now = self.clock.now();
        let tokens = grant.tokens_at(now)?;
        if !self.credentials.rotate(advertiser_id, &tokens, now).await? {
            return Err(CredentialError::NotLinked(advertiser_id));
        }
        tracing::info!(advertiser_id, expires_at = %tokens.token_expires_at, "advertiser token refreshed");
        Ok(tokens.access_token)
    }

    async fn call_platform<F>(&self, call: F) -> Result<TokenGrant, ProviderError>
    where
        F: Future<Output = Result<TokenGrant, ProviderError>>,
    {
        match tokio::time::timeout(self.settings.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Unavailable(format!(
                "platform did not answer within {:?}",
                self.settings.provider_timeout
            ))),
        }
    }
}
