//! Group model and the generic attribute update.
//!
//! Tracking behavior is configured per group through the closed
//! [`GroupAttribute`] set. A single update function covers all four
//! attributes; callers decide separately whether the change warrants a
//! reconciliation (see [`GroupAttribute::triggers_reconcile`]).

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use waymark_types::{GroupAttribute, GroupAttributeValue};

use crate::ForumError;

/// A forum group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    /// Internal database ID.
    pub id: i64,
    /// Stable unique name. Annotations reference groups by this name.
    pub name: String,
    /// Optional human-facing display name.
    pub full_name: Option<String>,
    /// Whether posts by this group's members are tracked.
    pub track_posts: bool,
    /// Whether this group's posts monopolize tracking in their topics.
    pub track_posts_with_priority: bool,
    /// Whether the group is offered in the navigation bar.
    pub add_to_navigation_bar: bool,
    /// Icon reference shown next to this group's tracked posts.
    pub tracked_post_icon: Option<String>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// A tracked group as exposed on the read surface.
///
/// `full_name`, `add_to_navigation_bar` and `tracked_post_icon` are
/// serialized only when set, matching what annotation consumers expect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedGroup {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub add_to_navigation_bar: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_post_icon: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Creates a new group. Tracking attributes start unset.
pub fn create_group(
    conn: &Connection,
    name: &str,
    full_name: Option<&str>,
) -> Result<Group, ForumError> {
    let group = conn.query_row(
        "INSERT INTO groups (name, full_name) VALUES (?1, ?2)
         RETURNING id, name, full_name, track_posts, track_posts_with_priority,
                   add_to_navigation_bar, tracked_post_icon, created_at",
        params![name, full_name],
        map_row_to_group,
    )?;
    Ok(group)
}

/// Retrieves a group by ID.
pub fn get_group(conn: &Connection, group_id: i64) -> Result<Group, ForumError> {
    conn.query_row(
        "SELECT id, name, full_name, track_posts, track_posts_with_priority,
                add_to_navigation_bar, tracked_post_icon, created_at
         FROM groups WHERE id = ?1",
        [group_id],
        map_row_to_group,
    )
    .optional()?
    .ok_or(ForumError::GroupNotFound(group_id))
}

/// Lists all tracked groups, ordered by name.
pub fn list_tracked_groups(conn: &Connection) -> Result<Vec<TrackedGroup>, ForumError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, full_name, add_to_navigation_bar, tracked_post_icon
         FROM groups WHERE track_posts = 1 ORDER BY name ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(TrackedGroup {
            id: row.get(0)?,
            name: row.get(1)?,
            full_name: row.get(2)?,
            add_to_navigation_bar: row.get(3)?,
            tracked_post_icon: row.get(4)?,
        })
    })?;

    let mut groups = Vec::new();
    for row in rows {
        groups.push(row?);
    }
    Ok(groups)
}

/// Updates a single group attribute, returning the updated group.
///
/// Rejects values whose kind does not match the attribute (a string for a
/// flag, a boolean for the icon) without touching the database.
pub fn set_group_attribute(
    conn: &Connection,
    group_id: i64,
    attribute: GroupAttribute,
    value: &GroupAttributeValue,
) -> Result<Group, ForumError> {
    if !value.fits(attribute) {
        return Err(ForumError::AttributeValueMismatch(attribute));
    }

    // Column names come from the closed GroupAttribute enum, never from
    // caller input.
    let sql = format!(
        "UPDATE groups SET {} = ?1 WHERE id = ?2
         RETURNING id, name, full_name, track_posts, track_posts_with_priority,
                   add_to_navigation_bar, tracked_post_icon, created_at",
        attribute.as_str()
    );

    let updated = match value {
        GroupAttributeValue::Flag(flag) => conn
            .query_row(&sql, params![flag, group_id], map_row_to_group)
            .optional()?,
        GroupAttributeValue::Text(text) => conn
            .query_row(&sql, params![text, group_id], map_row_to_group)
            .optional()?,
    };

    updated.ok_or(ForumError::GroupNotFound(group_id))
}

/// Deletes a group, returning its final state.
///
/// Members' `primary_group_id` references are cleared by the schema; posts
/// are untouched. Callers that need to react to the loss of a tracked group
/// inspect the returned state.
pub fn delete_group(conn: &Connection, group_id: i64) -> Result<Group, ForumError> {
    let group = get_group(conn, group_id)?;
    conn.execute("DELETE FROM groups WHERE id = ?1", [group_id])?;
    Ok(group)
}

fn map_row_to_group(row: &Row) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        full_name: row.get(2)?,
        track_posts: row.get(3)?,
        track_posts_with_priority: row.get(4)?,
        add_to_navigation_bar: row.get(5)?,
        tracked_post_icon: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use waymark_db::run_migrations;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().expect("failed to open in-memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("failed to enable foreign keys");
        run_migrations(&conn).expect("failed to run migrations");
        conn
    }

    #[test]
    fn test_group_crud() {
        let conn = setup_db();

        let group = create_group(&conn, "support", Some("Support Team")).expect("create failed");
        assert_eq!(group.name, "support");
        assert_eq!(group.full_name, Some("Support Team".to_string()));
        assert!(!group.track_posts);
        assert!(!group.track_posts_with_priority);

        let fetched = get_group(&conn, group.id).expect("get failed");
        assert_eq!(fetched, group);

        let deleted = delete_group(&conn, group.id).expect("delete failed");
        assert_eq!(deleted.id, group.id);

        let err = get_group(&conn, group.id).unwrap_err();
        match err {
            ForumError::GroupNotFound(id) => assert_eq!(id, group.id),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_set_flag_attribute() {
        let conn = setup_db();
        let group = create_group(&conn, "support", None).expect("create failed");

        let updated = set_group_attribute(
            &conn,
            group.id,
            GroupAttribute::TrackPosts,
            &GroupAttributeValue::Flag(true),
        )
        .expect("update failed");
        assert!(updated.track_posts);

        // Setting the same value again is idempotent.
        let again = set_group_attribute(
            &conn,
            group.id,
            GroupAttribute::TrackPosts,
            &GroupAttributeValue::Flag(true),
        )
        .expect("repeat update failed");
        assert!(again.track_posts);
    }

    #[test]
    fn test_set_icon_attribute_and_unset() {
        let conn = setup_db();
        let group = create_group(&conn, "support", None).expect("create failed");

        let updated = set_group_attribute(
            &conn,
            group.id,
            GroupAttribute::TrackedPostIcon,
            &GroupAttributeValue::Text(Some("compass".to_string())),
        )
        .expect("update failed");
        assert_eq!(updated.tracked_post_icon, Some("compass".to_string()));

        let cleared = set_group_attribute(
            &conn,
            group.id,
            GroupAttribute::TrackedPostIcon,
            &GroupAttributeValue::Text(None),
        )
        .expect("unset failed");
        assert_eq!(cleared.tracked_post_icon, None);
    }

    #[test]
    fn test_set_attribute_kind_mismatch() {
        let conn = setup_db();
        let group = create_group(&conn, "support", None).expect("create failed");

        let err = set_group_attribute(
            &conn,
            group.id,
            GroupAttribute::TrackPosts,
            &GroupAttributeValue::Text(Some("nope".to_string())),
        )
        .unwrap_err();
        match err {
            ForumError::AttributeValueMismatch(attr) => {
                assert_eq!(attr, GroupAttribute::TrackPosts)
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Nothing was written.
        let fetched = get_group(&conn, group.id).expect("get failed");
        assert!(!fetched.track_posts);
    }

    #[test]
    fn test_set_attribute_unknown_group() {
        let conn = setup_db();

        let err = set_group_attribute(
            &conn,
            999,
            GroupAttribute::TrackPosts,
            &GroupAttributeValue::Flag(true),
        )
        .unwrap_err();
        match err {
            ForumError::GroupNotFound(id) => assert_eq!(id, 999),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_list_tracked_groups_filters_and_orders() {
        let conn = setup_db();
        let support = create_group(&conn, "support", Some("Support Team")).expect("create failed");
        let arrivals = create_group(&conn, "arrivals", None).expect("create failed");
        create_group(&conn, "bystanders", None).expect("create failed");

        for id in [support.id, arrivals.id] {
            set_group_attribute(
                &conn,
                id,
                GroupAttribute::TrackPosts,
                &GroupAttributeValue::Flag(true),
            )
            .expect("flag update failed");
        }
        set_group_attribute(
            &conn,
            support.id,
            GroupAttribute::TrackedPostIcon,
            &GroupAttributeValue::Text(Some("compass".to_string())),
        )
        .expect("icon update failed");

        let tracked = list_tracked_groups(&conn).expect("list failed");
        assert_eq!(tracked.len(), 2);
        assert_eq!(tracked[0].name, "arrivals");
        assert_eq!(tracked[1].name, "support");
        assert_eq!(tracked[1].tracked_post_icon, Some("compass".to_string()));
    }

    #[test]
    fn test_tracked_group_serialization_omits_unset_fields() {
        let bare = TrackedGroup {
            id: 1,
            name: "arrivals".to_string(),
            full_name: None,
            add_to_navigation_bar: false,
            tracked_post_icon: None,
        };
        let json = serde_json::to_string(&bare).expect("serialize failed");
        assert_eq!(json, r#"{"id":1,"name":"arrivals"}"#);

        let full = TrackedGroup {
            id: 2,
            name: "support".to_string(),
            full_name: Some("Support Team".to_string()),
            add_to_navigation_bar: true,
            tracked_post_icon: Some("compass".to_string()),
        };
        let json = serde_json::to_string(&full).expect("serialize failed");
        assert!(json.contains(r#""add_to_navigation_bar":true"#));
        assert!(json.contains(r#""tracked_post_icon":"compass""#));
    }
}
