//! Error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::error::ServiceError;

/// Body of every 5xx response.
pub const INTERNAL_ERROR_DETAIL: &str = "Internal server error";

/// A [`ServiceError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let detail = if self.0.is_client_error() {
            self.0.to_string()
        } else {
            error!(status = status.as_u16(), error = %self.0, "request failed");
            INTERNAL_ERROR_DETAIL.to_string()
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
