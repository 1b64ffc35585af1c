//! User model.
//!
//! User ids may be caller-assigned so imported data keeps its identifiers.
//! Ids at or below zero belong to system actors; tracking never considers
//! their posts.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::ForumError;

/// A forum account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Account ID. Non-positive ids are system actors.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// The group whose tracking status applies to this user's posts.
    pub primary_group_id: Option<i64>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// The result of a primary group change, carrying both sides of the move.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryGroupChange {
    /// The user after the update.
    pub user: User,
    /// The primary group before the update.
    pub previous_group_id: Option<i64>,
}

/// Creates a new user.
///
/// When `id` is `None` the database assigns the next positive id; system
/// accounts are created by passing an explicit non-positive id.
pub fn create_user(
    conn: &Connection,
    id: Option<i64>,
    username: &str,
    primary_group_id: Option<i64>,
) -> Result<User, ForumError> {
    let user = match id {
        Some(id) => conn.query_row(
            "INSERT INTO users (id, username, primary_group_id) VALUES (?1, ?2, ?3)
             RETURNING id, username, primary_group_id, created_at",
            params![id, username, primary_group_id],
            map_row_to_user,
        )?,
        // Assigned ids skip past system actors at zero and below.
        None => conn.query_row(
            "INSERT INTO users (id, username, primary_group_id)
             VALUES (COALESCE((SELECT MAX(id) FROM users WHERE id > 0), 0) + 1, ?1, ?2)
             RETURNING id, username, primary_group_id, created_at",
            params![username, primary_group_id],
            map_row_to_user,
        )?,
    };
    Ok(user)
}

/// Retrieves a user by ID.
pub fn get_user(conn: &Connection, user_id: i64) -> Result<User, ForumError> {
    conn.query_row(
        "SELECT id, username, primary_group_id, created_at FROM users WHERE id = ?1",
        [user_id],
        map_row_to_user,
    )
    .optional()?
    .ok_or(ForumError::UserNotFound(user_id))
}

/// Changes a user's primary group, reporting the previous one.
pub fn set_primary_group(
    conn: &Connection,
    user_id: i64,
    group_id: Option<i64>,
) -> Result<PrimaryGroupChange, ForumError> {
    let previous_group_id: Option<i64> = conn
        .query_row(
            "SELECT primary_group_id FROM users WHERE id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(ForumError::UserNotFound(user_id))?;

    let user = conn.query_row(
        "UPDATE users SET primary_group_id = ?1 WHERE id = ?2
         RETURNING id, username, primary_group_id, created_at",
        params![group_id, user_id],
        map_row_to_user,
    )?;

    Ok(PrimaryGroupChange {
        user,
        previous_group_id,
    })
}

/// Deletes a user, returning the final state.
///
/// Posts keep their author id; they simply stop matching any account.
pub fn delete_user(conn: &Connection, user_id: i64) -> Result<User, ForumError> {
    let user = get_user(conn, user_id)?;
    conn.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
    Ok(user)
}

fn map_row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        primary_group_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}
