use axum::{
    extract::{Path, Query, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::app::AppState;
use crate::auth::orchestrator::REDIRECT_URL_KEY;
use crate::web::error::{ok, ApiError, ApiResult};
use crate::web::session::AdminSession;

#[derive(Debug, Deserialize)]
pub struct AuthUrlQuery {
    pub redirect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub auth_code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshAdvertiserRequest {
    pub advertiser_id: i64,
}

pub async fn auth_url(
    State(state): State<AppState>,
    AdminSession(claims): AdminSession,
    Query(q): Query<AuthUrlQuery>,
) -> ApiResult<impl IntoResponse> {
    let redirect_url = q.redirect_url.unwrap_or_default();
    if !redirect_url.is_empty() {
        let allowed = Url::parse(&redirect_url).is_ok_and(|u| state.config.redirect_allowed(&u));
        if !allowed {
            return Err(ApiError::bad_request("redirect_url is not an allowed origin"));
        }
    }
    let req = state.orchestrator.begin_authorization(&redirect_url).await?;
    tracing::info!(user_id = claims.user_id, "platform authorization started");
    Ok(ok(req))
}

/// Lands here from the platform's consent page. Redirects to the frontend when
/// the authorization was started with a `redirect_url`, otherwise answers JSON.
pub async fn callback(State(state): State<AppState>, Query(q): Query<CallbackQuery>) -> ApiResult<Response> {
    let auth_code = q
        .auth_code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing auth_code"))?;
    let state_token = q
        .state
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing state"))?;

    let outcome = state.orchestrator.complete_authorization(&state_token, &auth_code).await?;
    let count = outcome.advertiser_ids.len();

    let target = outcome
        .state_data
        .get(REDIRECT_URL_KEY)
        .filter(|u| !u.is_empty())
        .and_then(|u| Url::parse(u).ok())
        .filter(|u| state.config.redirect_allowed(u));
    if let Some(target) = target {
        let location = with_query(target, &[("auth_result", "success"), ("advertiser_count", &count.to_string())]);
        return Ok((StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response());
    }

    Ok(ok(json!({
        "advertiser_ids": outcome.advertiser_ids,
        "advertiser_count": count,
    }))
    .into_response())
}

pub async fn refresh(
    State(state): State<AppState>,
    AdminSession(claims): AdminSession,
    Json(req): Json<RefreshAdvertiserRequest>,
) -> ApiResult<impl IntoResponse> {
    state.orchestrator.force_refresh(req.advertiser_id).await?;
    tracing::info!(user_id = claims.user_id, advertiser_id = req.advertiser_id, "manual token refresh");
    Ok(ok(json!({ "advertiser_id": req.advertiser_id, "refreshed": true })))
}

pub async fn unlink(
    State(state): State<AppState>,
    AdminSession(claims): AdminSession,
    Path(advertiser_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.orchestrator.unlink(advertiser_id).await?;
    tracing::info!(user_id = claims.user_id, advertiser_id, "advertiser unlinked by admin");
    Ok(ok(json!({ "advertiser_id": advertiser_id, "linked": false })))
}

/// Sets each pair on `url`, replacing any existing values for those keys.
fn with_query(mut url: Url, pairs: &[(&str, &str)]) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(k, _)| !pairs.iter().any(|(name, _)| k == *name))
        .collect();
    {
        let mut q = url.query_pairs_mut();
        q.clear().extend_pairs(&kept).extend_pairs(pairs);
    }
    url
}
