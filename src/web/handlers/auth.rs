use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::app::AppState;
use crate::web::error::{ok, ApiError, ApiResult};
use crate::web::session::AdminSession;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<impl IntoResponse> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }
    let resp = state.admin.login(req.username.trim(), &req.password).await?;
    Ok(ok(resp))
}

pub async fn refresh(State(state): State<AppState>, Json(req): Json<RefreshRequest>) -> ApiResult<impl IntoResponse> {
    let resp = state.admin.refresh(&req.refresh_token).await?;
    Ok(ok(resp))
}

pub async fn me(State(state): State<AppState>, AdminSession(claims): AdminSession) -> ApiResult<impl IntoResponse> {
    let profile = state.admin.current_user(claims.user_id).await?;
    Ok(ok(profile))
}

pub async fn change_password(
    State(state): State<AppState>,
    AdminSession(claims): AdminSession,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .admin
        .change_password(claims.user_id, &req.old_password, &req.new_password)
        .await?;
    Ok(ok(json!({ "changed": true })))
}
