//! Post model.
//!
//! Post numbers are claimed from the owning topic's `highest_post_number`
//! allocator. Numbers are unique within a topic and never reused: deleting
//! a post leaves a gap, and moving a post renumbers it in the destination.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use waymark_types::PostType;

use crate::ForumError;

/// A post within a topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Internal database ID. Ascending ids double as creation order.
    pub id: i64,
    /// Owning topic.
    pub topic_id: i64,
    /// Author id. May refer to a deleted account.
    pub user_id: i64,
    /// Position within the topic.
    pub post_number: i64,
    /// Post classification.
    pub post_type: PostType,
    /// Raw body text.
    pub raw: String,
    /// Whether the author opted this post out of tracking.
    pub opted_out: bool,
    /// Soft-deletion timestamp, if deleted.
    pub deleted_at: Option<String>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// Parameters for creating a new post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostParams {
    pub topic_id: i64,
    pub user_id: i64,
    pub raw: String,
    pub post_type: PostType,
    pub opted_out: bool,
}

/// The result of an ownership change, carrying both authors.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerChange {
    /// The post after the update.
    pub post: Post,
    /// The author before the update.
    pub previous_user_id: i64,
}

/// The result of a move, carrying the topic the post left.
#[derive(Debug, Clone, PartialEq)]
pub struct PostMove {
    /// The post after the move, renumbered in its destination.
    pub post: Post,
    /// The topic the post was moved out of.
    pub source_topic_id: i64,
}

/// Creates a new post, claiming the next post number in its topic.
pub fn create_post(conn: &Connection, params: &CreatePostParams) -> Result<Post, ForumError> {
    let post_number = claim_post_number(conn, params.topic_id)?;

    let post = conn.query_row(
        "INSERT INTO posts (topic_id, user_id, post_number, post_type, raw, opted_out)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING id, topic_id, user_id, post_number, post_type, raw, opted_out,
                   deleted_at, created_at",
        params![
            params.topic_id,
            params.user_id,
            post_number,
            params.post_type.as_i64(),
            params.raw,
            params.opted_out,
        ],
        map_row_to_post,
    )?;
    Ok(post)
}

/// Retrieves a post by ID, soft-deleted or not.
pub fn get_post(conn: &Connection, post_id: i64) -> Result<Post, ForumError> {
    conn.query_row(
        "SELECT id, topic_id, user_id, post_number, post_type, raw, opted_out,
                deleted_at, created_at
         FROM posts WHERE id = ?1",
        [post_id],
        map_row_to_post,
    )
    .optional()?
    .ok_or(ForumError::PostNotFound(post_id))
}

/// Reassigns a post to a different author, reporting the previous one.
pub fn set_post_owner(
    conn: &Connection,
    post_id: i64,
    user_id: i64,
) -> Result<OwnerChange, ForumError> {
    let previous_user_id: i64 = conn
        .query_row("SELECT user_id FROM posts WHERE id = ?1", [post_id], |row| {
            row.get(0)
        })
        .optional()?
        .ok_or(ForumError::PostNotFound(post_id))?;

    let post = conn.query_row(
        "UPDATE posts SET user_id = ?1 WHERE id = ?2
         RETURNING id, topic_id, user_id, post_number, post_type, raw, opted_out,
                   deleted_at, created_at",
        params![user_id, post_id],
        map_row_to_post,
    )?;

    Ok(OwnerChange {
        post,
        previous_user_id,
    })
}

/// Moves a post to another topic, renumbering it there.
///
/// Moving a post into its current topic is a no-op and keeps its number.
pub fn move_post(
    conn: &Connection,
    post_id: i64,
    destination_topic_id: i64,
) -> Result<PostMove, ForumError> {
    let current = get_post(conn, post_id)?;
    if current.topic_id == destination_topic_id {
        return Ok(PostMove {
            source_topic_id: destination_topic_id,
            post: current,
        });
    }

    let post_number = claim_post_number(conn, destination_topic_id)?;

    let post = conn.query_row(
        "UPDATE posts SET topic_id = ?1, post_number = ?2 WHERE id = ?3
         RETURNING id, topic_id, user_id, post_number, post_type, raw, opted_out,
                   deleted_at, created_at",
        params![destination_topic_id, post_number, post_id],
        map_row_to_post,
    )?;

    Ok(PostMove {
        source_topic_id: current.topic_id,
        post,
    })
}

/// Soft-deletes a post. Idempotent; the original deletion time sticks.
pub fn soft_delete_post(conn: &Connection, post_id: i64) -> Result<Post, ForumError> {
    conn.query_row(
        "UPDATE posts SET deleted_at = COALESCE(deleted_at, datetime('now'))
         WHERE id = ?1
         RETURNING id, topic_id, user_id, post_number, post_type, raw, opted_out,
                   deleted_at, created_at",
        [post_id],
        map_row_to_post,
    )
    .optional()?
    .ok_or(ForumError::PostNotFound(post_id))
}

/// Claims the next post number from a topic's allocator.
fn claim_post_number(conn: &Connection, topic_id: i64) -> Result<i64, ForumError> {
    conn.query_row(
        "UPDATE topics SET highest_post_number = highest_post_number + 1
         WHERE id = ?1
         RETURNING highest_post_number",
        [topic_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(ForumError::TopicNotFound(topic_id))
}

fn map_row_to_post(row: &Row) -> rusqlite::Result<Post> {
    let type_code: i64 = row.get(4)?;
    let post_type = PostType::from_i64(type_code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Integer,
            format!("unknown post type code: {type_code}").into(),
        )
    })?;

    Ok(Post {
        id: row.get(0)?,
        topic_id: row.get(1)?,
        user_id: row.get(2)?,
        post_number: row.get(3)?,
        post_type,
        raw: row.get(5)?,
        opted_out: row.get(6)?,
        deleted_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}
