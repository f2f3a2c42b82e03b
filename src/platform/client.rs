use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use crate::config::PlatformCfg;
use crate::error::ProviderError;
use crate::platform::{AdPlatformOAuth, TokenGrant};

/// Response wrapper used by every platform endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    request_id: String,
    data: Option<T>,
}

#[derive(Serialize)]
struct AccessTokenRequest<'a> {
    app_id: &'a str,
    secret: &'a str,
    grant_type: &'static str,
    auth_code: &'a str,
}

#[derive(Serialize)]
struct RefreshTokenRequest<'a> {
    app_id: &'a str,
    secret: &'a str,
    grant_type: &'static str,
    refresh_token: &'a str,
}

pub struct PlatformClient {
    http: reqwest::Client,
    app_id: String,
    secret: String,
    api_base: String,
    auth_url: Url,
    redirect_uri: String,
    scopes: Vec<String>,
    material_auth: bool,
}

impl PlatformClient {
    pub fn new(cfg: &PlatformCfg, redirect_uri: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(cfg.timeout()).build()?;
        let auth_url = Url::parse(&cfg.auth_url)?;
        Ok(Self {
            http,
            app_id: cfg.app_id.clone(),
            secret: cfg.secret.clone(),
            api_base: cfg.api_base_url.trim_end_matches('/').to_string(),
            auth_url,
            redirect_uri,
            scopes: cfg.scopes.clone(),
            material_auth: cfg.material_auth,
        })
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.api_base, path);
        let resp = self.http.post(&url).json(body).send().await.map_err(|e| {
            tracing::warn!(error = %e, path, "platform request failed");
            ProviderError::Unavailable(if e.is_timeout() { "request timed out".into() } else { e.to_string() })
        })?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("failed to read response: {e}")))?;

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT {
            tracing::warn!(%status, path, "platform temporarily unavailable");
            return Err(ProviderError::Unavailable(format!("platform returned {status}")));
        }

        // data is decoded separately so a rejection with a partial payload still
        // reports its code
        let envelope = serde_json::from_slice::<Envelope<serde_json::Value>>(&bytes);

        if status.is_client_error() {
            return Err(match envelope {
                Ok(env) if env.code != 0 => classify_code(env.code, env.message),
                _ => ProviderError::Rejected {
                    code: i64::from(status.as_u16()),
                    message: status.canonical_reason().unwrap_or("client error").to_string(),
                },
            });
        }
        if status != StatusCode::OK {
            return Err(ProviderError::Unavailable(format!("unexpected status {status}")));
        }

        let env = envelope.map_err(|e| {
            tracing::warn!(error = %e, path, "undecodable platform response");
            ProviderError::Unavailable(format!("undecodable response: {e}"))
        })?;
        if env.code != 0 {
            tracing::info!(code = env.code, request_id = %env.request_id, path, "platform returned error code");
            return Err(classify_code(env.code, env.message));
        }
        let data = env
            .data
            .ok_or_else(|| ProviderError::Unavailable(format!("response without data (request_id={})", env.request_id)))?;
        serde_json::from_value(data).map_err(|e| {
            tracing::warn!(error = %e, request_id = %env.request_id, path, "unexpected platform payload");
            ProviderError::Unavailable(format!("undecodable data: {e}"))
        })
    }
}

/// Platform rate limit, returned with HTTP 200.
const CODE_RATE_LIMITED: i64 = 40100;
/// Platform-side failures (`5xxxx`), also returned with HTTP 200.
const CODE_SYSTEM_ERRORS: std::ops::RangeInclusive<i64> = 50000..=59999;

/// Rate limits and platform-side failures are transient; anything else is a refusal.
fn classify_code(code: i64, message: String) -> ProviderError {
    if code == CODE_RATE_LIMITED || CODE_SYSTEM_ERRORS.contains(&code) {
        ProviderError::Unavailable(format!("platform error {code}: {message}"))
    } else {
        ProviderError::Rejected { code, message }
    }
}

fn ensure_complete(grant: TokenGrant) -> Result<TokenGrant, ProviderError> {
    if grant.access_token.is_empty() || grant.refresh_token.is_empty() {
        return Err(ProviderError::Unavailable("grant is missing tokens".into()));
    }
    grant.validate_lifetimes()?;
    Ok(grant)
}

#[async_trait]
impl AdPlatformOAuth for PlatformClient {
    fn authorize_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("app_id", &self.app_id);
            q.append_pair("state", state);
            q.append_pair("redirect_uri", &self.redirect_uri);
            if !self.scopes.is_empty() {
                q.append_pair("scope", &self.scopes.join(","));
            }
            if self.material_auth {
                q.append_pair("material_auth", "1");
            }
        }
        url.to_string()
    }

    async fn exchange_code(&self, auth_code: &str) -> Result<TokenGrant, ProviderError> {
        let body = AccessTokenRequest {
            app_id: &self.app_id,
            secret: &self.secret,
            grant_type: "auth_code",
            auth_code,
        };
        let grant = self.post::<_, TokenGrant>("/oauth2/access_token/", &body).await?;
        ensure_complete(grant)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        let body = RefreshTokenRequest {
            app_id: &self.app_id,
            secret: &self.secret,
            grant_type: "refresh_token",
            refresh_token,
        };
        let grant = self.post::<_, TokenGrant>("/oauth2/refresh_token/", &body).await?;
        ensure_complete(grant)
    }
}
