use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::error::{AdminAuthError, CredentialError, PasswordError, StateError, TokenError};

/// Session errors, shared with the admin frontend.
pub const CODE_TOKEN_MISSING: i64 = 100100;
pub const CODE_TOKEN_INVALID: i64 = 100101;
pub const CODE_TOKEN_EXPIRED: i64 = 100102;

pub const CODE_BAD_REQUEST: i64 = 100000;
pub const CODE_INVALID_CREDENTIALS: i64 = 100200;
pub const CODE_ACCOUNT_DISABLED: i64 = 100201;
pub const CODE_ACCOUNT_LOCKED: i64 = 100202;
pub const CODE_USER_NOT_FOUND: i64 = 100203;
pub const CODE_WEAK_PASSWORD: i64 = 100204;

pub const CODE_NOT_LINKED: i64 = 200100;
pub const CODE_CREDENTIAL_REVOKED: i64 = 200101;
pub const CODE_PROVIDER_UNAVAILABLE: i64 = 200102;
pub const CODE_PROVIDER_REJECTED: i64 = 200103;
pub const CODE_INVALID_STATE: i64 = 200104;

pub const CODE_INTERNAL: i64 = 500000;

/// JSON error body `{"code": .., "message": ..}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i64,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, code: i64, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, CODE_BAD_REQUEST, message)
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, CODE_INTERNAL, "internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "code": self.code, "message": self.message }))).into_response()
    }
}

/// Success body `{"code": 0, "message": "ok", "data": ..}`.
pub fn ok<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({ "code": 0, "message": "ok", "data": data }))
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        let code = match err {
            TokenError::Expired => CODE_TOKEN_EXPIRED,
            TokenError::Malformed | TokenError::NotYetValid | TokenError::Invalid => CODE_TOKEN_INVALID,
        };
        ApiError::new(StatusCode::UNAUTHORIZED, code, err.to_string())
    }
}

impl From<AdminAuthError> for ApiError {
    fn from(err: AdminAuthError) -> Self {
        match err {
            AdminAuthError::InvalidCredentials => {
                ApiError::new(StatusCode::UNAUTHORIZED, CODE_INVALID_CREDENTIALS, err.to_string())
            }
            AdminAuthError::AccountDisabled => ApiError::new(StatusCode::FORBIDDEN, CODE_ACCOUNT_DISABLED, err.to_string()),
            AdminAuthError::AccountLocked => ApiError::new(StatusCode::FORBIDDEN, CODE_ACCOUNT_LOCKED, err.to_string()),
            AdminAuthError::RefreshTokenInvalid(e) => e.into(),
            AdminAuthError::UserNotFound(_) => ApiError::new(StatusCode::NOT_FOUND, CODE_USER_NOT_FOUND, err.to_string()),
            AdminAuthError::Password(PasswordError::WeakPassword(reason)) => {
                ApiError::new(StatusCode::BAD_REQUEST, CODE_WEAK_PASSWORD, reason)
            }
            other => {
                tracing::error!(error = ?other, "admin auth failure");
                ApiError::internal()
            }
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotLinked(_) => ApiError::new(StatusCode::NOT_FOUND, CODE_NOT_LINKED, err.to_string()),
            CredentialError::CredentialRevoked(_) => {
                ApiError::new(StatusCode::CONFLICT, CODE_CREDENTIAL_REVOKED, err.to_string())
            }
            CredentialError::ProviderUnavailable(_) => {
                ApiError::new(StatusCode::SERVICE_UNAVAILABLE, CODE_PROVIDER_UNAVAILABLE, "ad platform unavailable")
            }
            CredentialError::ProviderRejected { .. } => {
                ApiError::new(StatusCode::BAD_GATEWAY, CODE_PROVIDER_REJECTED, err.to_string())
            }
            CredentialError::State(StateError::InvalidOrExpiredState) => {
                ApiError::new(StatusCode::BAD_REQUEST, CODE_INVALID_STATE, "invalid or expired authorization request")
            }
            other => {
                tracing::error!(error = ?other, "credential failure");
                ApiError::internal()
            }
        }
    }
}
