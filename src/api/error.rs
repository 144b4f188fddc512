use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domain::DomainError;

/// Renders a [`DomainError`] as `{"detail": "<message>"}`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DomainError::Validation(_) | DomainError::UnsupportedSourceType(_) => {
                StatusCode::BAD_REQUEST
            }
            DomainError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            DomainError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(status = status.as_u16(), error = %self.0, "request failed");
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}
