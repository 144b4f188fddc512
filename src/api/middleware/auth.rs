use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::api::state::AppState;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Requires `X-API-Key` to match the configured key. Open when no key is set.
pub async fn api_key_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.config.config.auth.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided != Some(expected) {
        warn!(uri = %request.uri(), "rejected request without a valid api key");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
