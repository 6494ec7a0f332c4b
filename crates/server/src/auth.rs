//! Bearer-token authentication for mutating API routes.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::AppState;
use crate::error::ServerError;

/// Require a valid `Authorization: Bearer <token>` header.
///
/// When no token is configured, auth is disabled and every request passes;
/// otherwise a missing or wrong token fails with 401 before the handler
/// runs.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected => Ok(next.run(request).await),
        Some(_) => Err(ServerError::Unauthorized("invalid API token".into())),
        None => Err(ServerError::Unauthorized(
            "missing Authorization bearer token".into(),
        )),
    }
}
