//! Annotation store: persistence of `{group, post_number}` records.
//!
//! Two tables, one row per annotated topic or post, each holding the
//! serialized [`TrackedPost`] value. The store only moves bytes; deciding
//! *which* rows to write belongs to the reconciliation engine, which diffs
//! computed against stored state and calls the setters for actual changes
//! only. `updated_at` therefore moves only when a value really changed.

use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};
use waymark_types::TrackedPost;

use crate::TrackerError;

/// Reads a topic's annotation, if any.
pub fn topic_annotation(
    conn: &Connection,
    topic_id: i64,
) -> Result<Option<TrackedPost>, TrackerError> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM topic_tracked_posts WHERE topic_id = ?1",
            [topic_id],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|v| TrackedPost::from_json(&v))
        .transpose()
        .map_err(TrackerError::from)
}

/// Reads a post's annotation, if any.
pub fn post_annotation(
    conn: &Connection,
    post_id: i64,
) -> Result<Option<TrackedPost>, TrackerError> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM post_tracked_posts WHERE post_id = ?1",
            [post_id],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|v| TrackedPost::from_json(&v))
        .transpose()
        .map_err(TrackerError::from)
}

/// Writes a topic's annotation, inserting or replacing as needed.
pub fn set_topic_annotation(
    conn: &Connection,
    topic_id: i64,
    record: &TrackedPost,
) -> Result<(), TrackerError> {
    conn.execute(
        "INSERT INTO topic_tracked_posts (topic_id, value) VALUES (?1, ?2)
         ON CONFLICT (topic_id)
         DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        params![topic_id, record.to_json()?],
    )?;
    Ok(())
}

/// Writes a post's annotation, inserting or replacing as needed.
pub fn set_post_annotation(
    conn: &Connection,
    post_id: i64,
    record: &TrackedPost,
) -> Result<(), TrackerError> {
    conn.execute(
        "INSERT INTO post_tracked_posts (post_id, value) VALUES (?1, ?2)
         ON CONFLICT (post_id)
         DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
        params![post_id, record.to_json()?],
    )?;
    Ok(())
}

/// Removes a topic's annotation. Removing an absent one is a no-op.
pub fn clear_topic_annotation(conn: &Connection, topic_id: i64) -> Result<(), TrackerError> {
    conn.execute(
        "DELETE FROM topic_tracked_posts WHERE topic_id = ?1",
        [topic_id],
    )?;
    Ok(())
}

/// Removes a post's annotation. Removing an absent one is a no-op.
pub fn clear_post_annotation(conn: &Connection, post_id: i64) -> Result<(), TrackerError> {
    conn.execute(
        "DELETE FROM post_tracked_posts WHERE post_id = ?1",
        [post_id],
    )?;
    Ok(())
}

/// Loads topic annotations, either for one topic or for the whole corpus.
pub fn topic_annotations_in_scope(
    conn: &Connection,
    topic_id: Option<i64>,
) -> Result<BTreeMap<i64, TrackedPost>, TrackerError> {
    let mut annotations = BTreeMap::new();

    match topic_id {
        Some(topic_id) => {
            if let Some(record) = topic_annotation(conn, topic_id)? {
                annotations.insert(topic_id, record);
            }
        }
        None => {
            let mut stmt = conn.prepare("SELECT topic_id, value FROM topic_tracked_posts")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (topic_id, value) = row?;
                annotations.insert(topic_id, TrackedPost::from_json(&value)?);
            }
        }
    }

    Ok(annotations)
}

/// Loads post annotations, either for one topic's posts or for the whole
/// corpus. Scoping joins through `posts`, so a post that was moved away is
/// no longer part of its old topic's scope.
pub fn post_annotations_in_scope(
    conn: &Connection,
    topic_id: Option<i64>,
) -> Result<BTreeMap<i64, TrackedPost>, TrackerError> {
    let mut annotations = BTreeMap::new();

    match topic_id {
        Some(topic_id) => {
            let mut stmt = conn.prepare(
                "SELECT pt.post_id, pt.value
                 FROM post_tracked_posts pt
                 JOIN posts p ON p.id = pt.post_id
                 WHERE p.topic_id = ?1",
            )?;
            let rows = stmt.query_map([topic_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (post_id, value) = row?;
                annotations.insert(post_id, TrackedPost::from_json(&value)?);
            }
        }
        None => {
            let mut stmt = conn.prepare("SELECT post_id, value FROM post_tracked_posts")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (post_id, value) = row?;
                annotations.insert(post_id, TrackedPost::from_json(&value)?);
            }
        }
    }

    Ok(annotations)
}
