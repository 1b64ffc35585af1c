//! Shared API error type and domain-error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use waymark_forum::ForumError;
use waymark_tracker::TrackerError;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Maps a [`ForumError`] to the right API error, logging unexpected ones.
///
/// Unknown-id variants become 404, a value/attribute kind mismatch becomes
/// 400, unique/foreign-key violations become 409, everything else is a 500.
pub(crate) fn forum_error(e: ForumError) -> ApiError {
    match e {
        ForumError::GroupNotFound(_)
        | ForumError::UserNotFound(_)
        | ForumError::TopicNotFound(_)
        | ForumError::PostNotFound(_) => ApiError::NotFound(e.to_string()),
        ForumError::AttributeValueMismatch(_) => ApiError::BadRequest(e.to_string()),
        ForumError::Database(rusqlite::Error::SqliteFailure(ref code, ref message))
            if code.code == rusqlite::ffi::ErrorCode::ConstraintViolation =>
        {
            ApiError::Conflict(
                message
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string()),
            )
        }
        ref err => {
            tracing::error!(error = %err, "forum operation failed");
            ApiError::InternalServerError(e.to_string())
        }
    }
}

/// Maps a [`TrackerError`] to the API error space.
pub(crate) fn tracker_error(e: TrackerError) -> ApiError {
    tracing::error!(error = %e, "tracker operation failed");
    ApiError::InternalServerError(e.to_string())
}

/// Shorthand for the recurring pool-checkout failure mapping.
pub(crate) fn pool_error(e: r2d2::Error) -> ApiError {
    ApiError::InternalServerError(format!("db connection failed: {e}"))
}

/// Maps a blocking-task join failure.
pub(crate) fn join_error(e: tokio::task::JoinError) -> ApiError {
    ApiError::InternalServerError(format!("task join error: {e}"))
}
