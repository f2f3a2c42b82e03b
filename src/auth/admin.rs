use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::session::{SessionProfile, SessionTokenIssuer};
use crate::clock::TimeProvider;
use crate::error::{AdminAuthError, PasswordError};
use crate::models::admin_user::{AdminStatus, AdminUser};
use crate::repos::{AdminUsersRepo, NewAdminRecord};
use crate::security::PasswordPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct NewAdmin {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub role_id: i64,
    #[serde(default)]
    pub role_key: String,
    #[serde(default = "default_data_scope")]
    pub data_scope: String,
}

fn default_data_scope() -> String {
    "self".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminProfile {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub role_id: i64,
    pub role_key: String,
    pub data_scope: String,
    pub last_login_at: Option<String>,
}

impl From<&AdminUser> for AdminProfile {
    fn from(u: &AdminUser) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            nickname: u.nickname.clone(),
            role_id: u.role_id,
            role_key: u.role_key.clone(),
            data_scope: u.data_scope.clone(),
            last_login_at: u.last_login_at.clone(),
        }
    }
}

impl From<&AdminUser> for SessionProfile {
    fn from(u: &AdminUser) -> Self {
        Self {
            user_id: u.id,
            username: u.username.clone(),
            role_key: u.role_key.clone(),
            role_id: u.role_id,
            data_scope: u.data_scope.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: AdminProfile,
}

/// Admin panel login, session refresh and password management.
pub struct AdminAuthService {
    users: Arc<dyn AdminUsersRepo>,
    passwords: PasswordPolicy,
    tokens: SessionTokenIssuer,
    clock: Arc<dyn TimeProvider>,
    // verified against when the username is unknown so both paths cost one hash
    decoy_hash: String,
}

impl AdminAuthService {
    pub fn new(
        users: Arc<dyn AdminUsersRepo>,
        passwords: PasswordPolicy,
        tokens: SessionTokenIssuer,
        clock: Arc<dyn TimeProvider>,
    ) -> Result<Self, AdminAuthError> {
        let decoy_hash = passwords.hash("decoy-password-never-matches")?;
        Ok(Self { users, passwords, tokens, clock, decoy_hash })
    }

    pub fn tokens(&self) -> &SessionTokenIssuer {
        &self.tokens
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AdminAuthError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            let _ = self.passwords.verify(password, &self.decoy_hash);
            tracing::info!(username, "login rejected: unknown user");
            return Err(AdminAuthError::InvalidCredentials);
        };

        match self.passwords.verify(password, &user.password_hash) {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(user_id = user.id, "login rejected: wrong password");
                return Err(AdminAuthError::InvalidCredentials);
            }
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "stored password hash is unusable");
                return Err(AdminAuthError::InvalidCredentials);
            }
        }
        ensure_active(&user)?;

        self.users.record_login(user.id, self.clock.now()).await?;
        tracing::info!(user_id = user.id, "admin logged in");
        self.issue(&user)
    }

    /// Mints a new access token and a new refresh token from a valid refresh
    /// token. The user is reloaded so role or status changes take effect.
    pub async fn refresh(&self, refresh_token: &str) -> Result<LoginResponse, AdminAuthError> {
        let claims = self
            .tokens
            .verify_refresh(refresh_token)
            .map_err(AdminAuthError::RefreshTokenInvalid)?;

        let user = self
            .users
            .find_by_id(claims.user_id)
            .await?
            .ok_or(AdminAuthError::UserNotFound(claims.user_id))?;
        ensure_active(&user)?;

        self.issue(&user)
    }

    pub async fn current_user(&self, user_id: i64) -> Result<AdminProfile, AdminAuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AdminAuthError::UserNotFound(user_id))?;
        Ok(AdminProfile::from(&user))
    }

    pub async fn change_password(&self, user_id: i64, old: &str, new: &str) -> Result<(), AdminAuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AdminAuthError::UserNotFound(user_id))?;

        match self.passwords.verify(old, &user.password_hash) {
            Ok(true) => {}
            Ok(false) | Err(PasswordError::InvalidHash) => return Err(AdminAuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        }
        self.passwords.validate_complexity(new)?;

        let hash = self.passwords.hash(new)?;
        self.users.update_password(user_id, &hash, self.clock.now()).await?;
        tracing::info!(user_id, "admin password changed");
        Ok(())
    }

    pub async fn create_user(&self, new: NewAdmin) -> Result<AdminProfile, AdminAuthError> {
        self.passwords.validate_complexity(&new.password)?;
        let password_hash = self.passwords.hash(&new.password)?;

        let user = self
            .users
            .create(
                NewAdminRecord {
                    username: new.username,
                    password_hash,
                    nickname: new.nickname,
                    role_id: new.role_id,
                    role_key: new.role_key,
                    data_scope: new.data_scope,
                    status: AdminStatus::Enabled,
                },
                self.clock.now(),
            )
            .await?;
        tracing::info!(user_id = user.id, username = %user.username, "admin user created");
        Ok(AdminProfile::from(&user))
    }

    fn issue(&self, user: &AdminUser) -> Result<LoginResponse, AdminAuthError> {
        let pair = self
            .tokens
            .issue_pair(&SessionProfile::from(user))
            .map_err(|e| AdminAuthError::Signing(e.to_string()))?;
        Ok(LoginResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            user: AdminProfile::from(user),
        })
    }
}

fn ensure_active(user: &AdminUser) -> Result<(), AdminAuthError> {
    match user.status() {
        AdminStatus::Enabled => Ok(()),
        AdminStatus::Disabled => Err(AdminAuthError::AccountDisabled),
        AdminStatus::Locked => Err(AdminAuthError::AccountLocked),
    }
}
