//! Error type shared by the forum model operations.

use thiserror::Error;
use waymark_types::GroupAttribute;

/// Errors that can occur during forum model operations.
#[derive(Debug, Error)]
pub enum ForumError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("group not found: {0}")]
    GroupNotFound(i64),
    #[error("user not found: {0}")]
    UserNotFound(i64),
    #[error("topic not found: {0}")]
    TopicNotFound(i64),
    #[error("post not found: {0}")]
    PostNotFound(i64),
    #[error("value kind does not match attribute '{0}'")]
    AttributeValueMismatch(GroupAttribute),
}
