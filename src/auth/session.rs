use std::sync::Arc;

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::clock::TimeProvider;
use crate::config::JwtCfg;
use crate::error::TokenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Who the admin session belongs to. Copied into every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProfile {
    pub user_id: i64,
    pub username: String,
    pub role_key: String,
    pub role_id: i64,
    pub data_scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: i64,
    pub username: String,
    pub role_key: String,
    pub role_id: i64,
    pub data_scope: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub typ: TokenKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub user_id: i64,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub typ: TokenKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

// Shape-agnostic view used while verifying so a token of the wrong kind is
// reported as `Invalid` rather than failing deserialization.
#[derive(Debug, Deserialize)]
struct AnyClaims {
    user_id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    role_key: Option<String>,
    #[serde(default)]
    role_id: Option<i64>,
    #[serde(default)]
    data_scope: Option<String>,
    iss: String,
    iat: i64,
    exp: i64,
    nbf: i64,
    typ: TokenKind,
}

/// Stateless HS256 signer/verifier for admin session tokens.
///
/// There is no revocation list: a leaked access token stays valid until its
/// `exp`, which is why the access TTL is kept short.
#[derive(Clone)]
pub struct SessionTokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
    clock: Arc<dyn TimeProvider>,
}

impl std::fmt::Debug for SessionTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenIssuer")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl SessionTokenIssuer {
    pub fn new(cfg: &JwtCfg, clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            access_ttl: cfg.access_ttl(),
            refresh_ttl: cfg.refresh_ttl(),
            clock,
        }
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        self.access_ttl
    }

    pub fn issue_access_token(&self, profile: &SessionProfile) -> anyhow::Result<String> {
        let now = self.clock.unix_timestamp();
        let claims = SessionClaims {
            user_id: profile.user_id,
            username: profile.username.clone(),
            role_key: profile.role_key.clone(),
            role_id: profile.role_id,
            data_scope: profile.data_scope.clone(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.access_ttl.num_seconds(),
            nbf: now,
            typ: TokenKind::Access,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    pub fn issue_refresh_token(&self, user_id: i64) -> anyhow::Result<String> {
        let now = self.clock.unix_timestamp();
        let claims = RefreshClaims {
            user_id,
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.refresh_ttl.num_seconds(),
            nbf: now,
            typ: TokenKind::Refresh,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    pub fn issue_pair(&self, profile: &SessionProfile) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access_token(profile)?,
            refresh_token: self.issue_refresh_token(profile.user_id)?,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let c = self.verify_kind(token, TokenKind::Access)?;
        match (c.username, c.role_key, c.role_id, c.data_scope) {
            (Some(username), Some(role_key), Some(role_id), Some(data_scope)) => Ok(SessionClaims {
                user_id: c.user_id,
                username,
                role_key,
                role_id,
                data_scope,
                iss: c.iss,
                iat: c.iat,
                exp: c.exp,
                nbf: c.nbf,
                typ: c.typ,
            }),
            _ => Err(TokenError::Invalid),
        }
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let c = self.verify_kind(token, TokenKind::Refresh)?;
        Ok(RefreshClaims { user_id: c.user_id, iss: c.iss, iat: c.iat, exp: c.exp, nbf: c.nbf, typ: c.typ })
    }

    fn verify_kind(&self, token: &str, expected: TokenKind) -> Result<AnyClaims, TokenError> {
        // Time checks run against the injected clock below, not jsonwebtoken's.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "nbf", "iss"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<AnyClaims>(token, &self.decoding, &validation).map_err(map_jwt_error)?;
        let claims = data.claims;

        let now = self.clock.unix_timestamp();
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if now < claims.nbf {
            return Err(TokenError::NotYetValid);
        }
        if claims.typ != expected {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => TokenError::Malformed,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::ImmatureSignature => TokenError::NotYetValid,
        _ => TokenError::Invalid,
    }
}
