use thiserror::Error;

/// Why a session token was refused. Callers react differently to each:
/// `Expired` may trigger a silent refresh, `NotYetValid` points at clock skew,
/// the rest are rejected outright.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("token is not active yet")]
    NotYetValid,

    #[error("token is invalid")]
    Invalid,
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("invalid or expired state")]
    InvalidOrExpiredState,

    #[error("state cache unavailable: {0}")]
    Cache(String),
}

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("weak password: {0}")]
    WeakPassword(&'static str),

    #[error("stored password hash is malformed")]
    InvalidHash,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Outcome of a failed call to the platform's OAuth endpoints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Transport failure, timeout or 5xx. Safe for a higher layer to retry.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered and said no.
    #[error("provider rejected request: code={code}, message={message}")]
    Rejected { code: i64, message: String },
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("advertiser {0} is not linked")]
    NotLinked(i64),

    #[error("credential for advertiser {0} was revoked upstream; re-authorization required")]
    CredentialRevoked(i64),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider rejected request: code={code}, message={message}")]
    ProviderRejected { code: i64, message: String },

    #[error(transparent)]
    State(#[from] StateError),

    #[error("credential store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<ProviderError> for CredentialError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) => CredentialError::ProviderUnavailable(msg),
            ProviderError::Rejected { code, message } => CredentialError::ProviderRejected { code, message },
        }
    }
}

#[derive(Error, Debug)]
pub enum AdminAuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("account is locked")]
    AccountLocked,

    #[error("refresh token rejected: {0}")]
    RefreshTokenInvalid(TokenError),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("admin store error: {0}")]
    Store(#[from] anyhow::Error),
}
