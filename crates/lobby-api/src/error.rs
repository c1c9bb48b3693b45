use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use lobby_media::MediaError;

/// Request-scoped failures. Nothing here is fatal to the process; every
/// variant maps to a single HTTP response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad query parameter, missing resource, invalid upload — 400 with a
    /// human-readable detail message.
    #[error("{0}")]
    Validation(String),
    #[error("Authentication credentials were not provided or are invalid.")]
    AuthenticationFailed,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::AuthenticationFailed => (
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided or are invalid.".to_string(),
            ),
            ApiError::Internal(err) => {
                error!("Internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

/// A blocking DB task that failed to join is an internal fault, not a
/// validation problem.
pub(crate) fn join_err(err: tokio::task::JoinError) -> ApiError {
    ApiError::Internal(anyhow::anyhow!("blocking task join error: {}", err))
}
