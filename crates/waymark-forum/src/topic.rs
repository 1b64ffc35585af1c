//! Topic model.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use waymark_types::Archetype;

use crate::ForumError;

/// A discussion topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    /// Internal database ID.
    pub id: i64,
    /// Topic title.
    pub title: String,
    /// Whether this is a public topic or a private message thread.
    pub archetype: Archetype,
    /// Highest post number ever assigned in this topic. Monotonic; moves
    /// and deletions never lower it.
    pub highest_post_number: i64,
    /// Soft-deletion timestamp, if deleted.
    pub deleted_at: Option<String>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// Creates a new topic.
pub fn create_topic(
    conn: &Connection,
    title: &str,
    archetype: Archetype,
) -> Result<Topic, ForumError> {
    let topic = conn.query_row(
        "INSERT INTO topics (title, archetype) VALUES (?1, ?2)
         RETURNING id, title, archetype, highest_post_number, deleted_at, created_at",
        params![title, archetype.as_str()],
        map_row_to_topic,
    )?;
    Ok(topic)
}

/// Retrieves a topic by ID.
pub fn get_topic(conn: &Connection, topic_id: i64) -> Result<Topic, ForumError> {
    conn.query_row(
        "SELECT id, title, archetype, highest_post_number, deleted_at, created_at
         FROM topics WHERE id = ?1",
        [topic_id],
        map_row_to_topic,
    )
    .optional()?
    .ok_or(ForumError::TopicNotFound(topic_id))
}

/// Soft-deletes a topic. Idempotent; the original deletion time sticks.
///
/// Posts and annotations stay in place. A deleted topic stops producing
/// tracked posts, and a later full reconciliation prunes its annotations.
pub fn soft_delete_topic(conn: &Connection, topic_id: i64) -> Result<Topic, ForumError> {
    conn.query_row(
        "UPDATE topics SET deleted_at = COALESCE(deleted_at, datetime('now'))
         WHERE id = ?1
         RETURNING id, title, archetype, highest_post_number, deleted_at, created_at",
        [topic_id],
        map_row_to_topic,
    )
    .optional()?
    .ok_or(ForumError::TopicNotFound(topic_id))
}

pub(crate) fn map_row_to_topic(row: &Row) -> rusqlite::Result<Topic> {
    let archetype_str: String = row.get(2)?;
    let archetype: Archetype = archetype_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Topic {
        id: row.get(0)?,
        title: row.get(1)?,
        archetype,
        highest_post_number: row.get(3)?,
        deleted_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}
