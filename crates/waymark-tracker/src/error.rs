//! Error type shared by the tracker components.

use thiserror::Error;

/// Errors that can occur during tracking operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("invalid annotation payload: {0}")]
    Json(#[from] serde_json::Error),
}
