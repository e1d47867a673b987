//! Domain-error to wire-envelope translation.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use peanut_core::Error;
use serde_json::json;
use tracing::error;

/// The boundary's error type: a thin wrapper mapping [`Error`] to an
/// HTTP status and the `{"error": {"code", "message"}}` envelope.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::ExternalService { .. } => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal detail stays in the logs, not on the wire.
        let message = match &self.0 {
            Error::Internal(detail) => {
                error!(detail, "internal error at the boundary");
                "internal error".to_string()
            },
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": self.0.code(),
                "message": message,
            }
        }));

        match self.0 {
            Error::RateLimited { retry_after_secs } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}
