use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use std::future::Future;

use crate::app::AppState;
use crate::auth::session::SessionClaims;
use crate::web::error::{ApiError, CODE_TOKEN_MISSING};

/// Extractor for routes that need a signed-in admin.
///
/// Reads `Authorization: Bearer <access token>` and verifies it with the
/// session issuer. A refresh token is refused here.
pub struct AdminSession(pub SessionClaims);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let tokens = state.admin.tokens().clone();

        async move {
            let token = header
                .as_deref()
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, CODE_TOKEN_MISSING, "missing bearer token"))?;

            let claims = tokens.verify(token).map_err(|e| {
                tracing::debug!(error = %e, "rejected admin session token");
                ApiError::from(e)
            })?;
            Ok(AdminSession(claims))
        }
    }
}
