//! Bearer-token gate for mutating routes.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use vitals_store::Store;

use crate::state::AppState;
use crate::WebError;

/// Checks `Authorization: Bearer <token>` against the configured secret.
/// With no secret configured the middleware passes everything through.
pub async fn require_bearer<S: Store + 'static>(
    State(state): State<AppState<S>>,
    request: Request,
    next: Next,
) -> Result<Response, WebError> {
    let Some(expected) = state.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
        return Ok(next.run(request).await);
    };

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(WebError::Unauthorized)?;
    let (scheme, token) = header.split_once(' ').ok_or(WebError::Unauthorized)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim() != expected {
        return Err(WebError::Unauthorized);
    }

    Ok(next.run(request).await)
}
