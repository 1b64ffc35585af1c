//! Group tracking policy: decides which posts can be tracked.
//!
//! The predicate is total: missing authors, unknown post type codes and
//! inconsistent rows all evaluate to "not tracked", never to an error.
//! Eligibility is the reconciliation engine's concern too; the engine
//! expresses the same conditions in SQL, while this module serves the
//! event dispatcher's per-post gate checks.

use rusqlite::{Connection, OptionalExtension};
use waymark_types::{Archetype, PostType};

use crate::TrackerError;

/// Everything the policy needs to know about one post.
#[derive(Debug, Clone, PartialEq)]
pub struct PostTrackingView {
    /// The post's id.
    pub post_id: i64,
    /// The topic the post currently belongs to.
    pub topic_id: i64,
    /// The author id as stored, whether or not the account still exists.
    pub author_id: i64,
    /// Decoded post type; `None` for unknown stored codes.
    pub post_type: Option<PostType>,
    /// Archetype of the owning topic.
    pub archetype: Archetype,
    /// Whether the post is soft-deleted.
    pub deleted: bool,
    /// The author's primary group; `None` when the account is gone or has
    /// no primary group.
    pub author_primary_group_id: Option<i64>,
    /// Whether the author opted this post out of tracking.
    pub opted_out: bool,
}

/// Loads the policy view of a post, or `None` if the post does not exist.
pub fn load_post_view(
    conn: &Connection,
    post_id: i64,
) -> Result<Option<PostTrackingView>, TrackerError> {
    let view = conn
        .query_row(
            "SELECT p.id, p.topic_id, p.user_id, p.post_type, t.archetype,
                    p.deleted_at IS NOT NULL, u.primary_group_id, p.opted_out
             FROM posts p
             JOIN topics t ON t.id = p.topic_id
             LEFT JOIN users u ON u.id = p.user_id
             WHERE p.id = ?1",
            [post_id],
            |row| {
                let type_code: i64 = row.get(3)?;
                let archetype_str: String = row.get(4)?;
                let archetype: Archetype = archetype_str.parse().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        4,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;

                Ok(PostTrackingView {
                    post_id: row.get(0)?,
                    topic_id: row.get(1)?,
                    author_id: row.get(2)?,
                    post_type: PostType::from_i64(type_code),
                    archetype,
                    deleted: row.get(5)?,
                    author_primary_group_id: row.get(6)?,
                    opted_out: row.get(7)?,
                })
            },
        )
        .optional()?;
    Ok(view)
}

/// Whether a post is eligible to be a tracked post.
///
/// All of the following must hold: the author is a genuine account (id
/// above zero), the post type is regular or moderator action, the topic is
/// not a private message, the post is not deleted, the author still exists
/// with a tracked primary group, and the post was not opted out.
pub fn should_track(view: &PostTrackingView, tracked_group_ids: &[i64]) -> bool {
    let post_type_tracks = matches!(
        view.post_type,
        Some(PostType::Regular) | Some(PostType::ModeratorAction)
    );

    view.author_id > 0
        && post_type_tracks
        && view.archetype != Archetype::PrivateMessage
        && !view.deleted
        && view
            .author_primary_group_id
            .is_some_and(|group_id| tracked_group_ids.contains(&group_id))
        && !view.opted_out
}

/// Ids of all tracked groups.
pub fn tracked_group_ids(conn: &Connection) -> Result<Vec<i64>, TrackerError> {
    let mut stmt = conn.prepare("SELECT id FROM groups WHERE track_posts = 1 ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Ids of tracked groups that also carry the priority flag.
///
/// Priority refines tracking: the flag has no effect on a group that is
/// not itself tracked.
pub fn priority_tracked_group_ids(conn: &Connection) -> Result<Vec<i64>, TrackerError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM groups
         WHERE track_posts = 1 AND track_posts_with_priority = 1
         ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use waymark_db::run_migrations;
    use waymark_forum::{
        create_group, create_post, create_topic, create_user, set_group_attribute,
        soft_delete_post, CreatePostParams,
    };
    use waymark_types::{GroupAttribute, GroupAttributeValue};

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().expect("failed to open in-memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("failed to enable foreign keys");
        run_migrations(&conn).expect("failed to run migrations");
        conn
    }

    fn tracked_group(conn: &Connection, name: &str) -> i64 {
        let group = create_group(conn, name, None).expect("create group failed");
        set_group_attribute(
            conn,
            group.id,
            GroupAttribute::TrackPosts,
            &GroupAttributeValue::Flag(true),
        )
        .expect("flag update failed");
        group.id
    }

    fn post_by(conn: &Connection, topic_id: i64, user_id: i64, post_type: PostType) -> i64 {
        create_post(
            conn,
            &CreatePostParams {
                topic_id,
                user_id,
                raw: "content".to_string(),
                post_type,
                opted_out: false,
            },
        )
        .expect("create post failed")
        .id
    }

    #[test]
    fn eligible_post_is_tracked() {
        let conn = setup_db();
        let group_id = tracked_group(&conn, "support");
        let user = create_user(&conn, None, "ada", Some(group_id)).expect("user failed");
        let topic = create_topic(&conn, "topic", Archetype::Regular).expect("topic failed");
        let post_id = post_by(&conn, topic.id, user.id, PostType::Regular);

        let tracked = tracked_group_ids(&conn).expect("projection failed");
        let view = load_post_view(&conn, post_id)
            .expect("load failed")
            .expect("view should exist");
        assert!(should_track(&view, &tracked));
    }

    #[test]
    fn moderator_action_posts_are_tracked() {
        let conn = setup_db();
        let group_id = tracked_group(&conn, "support");
        let user = create_user(&conn, None, "ada", Some(group_id)).expect("user failed");
        let topic = create_topic(&conn, "topic", Archetype::Regular).expect("topic failed");
        let post_id = post_by(&conn, topic.id, user.id, PostType::ModeratorAction);

        let tracked = tracked_group_ids(&conn).expect("projection failed");
        let view = load_post_view(&conn, post_id)
            .expect("load failed")
            .expect("view should exist");
        assert!(should_track(&view, &tracked));
    }

    #[test]
    fn system_authors_are_not_tracked() {
        let conn = setup_db();
        let group_id = tracked_group(&conn, "support");
        create_user(&conn, Some(-1), "import_bot", Some(group_id)).expect("user failed");
        let topic = create_topic(&conn, "topic", Archetype::Regular).expect("topic failed");
        let post_id = post_by(&conn, topic.id, -1, PostType::Regular);

        let tracked = tracked_group_ids(&conn).expect("projection failed");
        let view = load_post_view(&conn, post_id)
            .expect("load failed")
            .expect("view should exist");
        assert!(!should_track(&view, &tracked));
    }

    #[test]
    fn whispers_and_small_actions_are_not_tracked() {
        let conn = setup_db();
        let group_id = tracked_group(&conn, "support");
        let user = create_user(&conn, None, "ada", Some(group_id)).expect("user failed");
        let topic = create_topic(&conn, "topic", Archetype::Regular).expect("topic failed");

        let tracked = tracked_group_ids(&conn).expect("projection failed");
        for post_type in [PostType::SmallAction, PostType::Whisper] {
            let post_id = post_by(&conn, topic.id, user.id, post_type);
            let view = load_post_view(&conn, post_id)
                .expect("load failed")
                .expect("view should exist");
            assert!(!should_track(&view, &tracked), "{post_type:?}");
        }
    }

    #[test]
    fn private_messages_are_not_tracked() {
        let conn = setup_db();
        let group_id = tracked_group(&conn, "support");
        let user = create_user(&conn, None, "ada", Some(group_id)).expect("user failed");
        let pm = create_topic(&conn, "psst", Archetype::PrivateMessage).expect("topic failed");
        let post_id = post_by(&conn, pm.id, user.id, PostType::Regular);

        let tracked = tracked_group_ids(&conn).expect("projection failed");
        let view = load_post_view(&conn, post_id)
            .expect("load failed")
            .expect("view should exist");
        assert!(!should_track(&view, &tracked));
    }

    #[test]
    fn deleted_posts_are_not_tracked() {
        let conn = setup_db();
        let group_id = tracked_group(&conn, "support");
        let user = create_user(&conn, None, "ada", Some(group_id)).expect("user failed");
        let topic = create_topic(&conn, "topic", Archetype::Regular).expect("topic failed");
        let post_id = post_by(&conn, topic.id, user.id, PostType::Regular);
        soft_delete_post(&conn, post_id).expect("delete failed");

        let tracked = tracked_group_ids(&conn).expect("projection failed");
        let view = load_post_view(&conn, post_id)
            .expect("load failed")
            .expect("view should exist");
        assert!(!should_track(&view, &tracked));
    }

    #[test]
    fn untracked_group_and_missing_author_are_not_tracked() {
        let conn = setup_db();
        let plain = create_group(&conn, "bystanders", None).expect("group failed");
        let user = create_user(&conn, None, "ada", Some(plain.id)).expect("user failed");
        let topic = create_topic(&conn, "topic", Archetype::Regular).expect("topic failed");
        let by_untracked = post_by(&conn, topic.id, user.id, PostType::Regular);
        let by_nobody = post_by(&conn, topic.id, 777, PostType::Regular);

        let tracked = tracked_group_ids(&conn).expect("projection failed");
        assert!(tracked.is_empty());

        let view = load_post_view(&conn, by_untracked)
            .expect("load failed")
            .expect("view should exist");
        assert!(!should_track(&view, &tracked));

        let view = load_post_view(&conn, by_nobody)
            .expect("load failed")
            .expect("view should exist");
        assert_eq!(view.author_primary_group_id, None);
        assert!(!should_track(&view, &tracked));
    }

    #[test]
    fn opted_out_posts_are_not_tracked() {
        let conn = setup_db();
        let group_id = tracked_group(&conn, "support");
        let user = create_user(&conn, None, "ada", Some(group_id)).expect("user failed");
        let topic = create_topic(&conn, "topic", Archetype::Regular).expect("topic failed");
        let post = create_post(
            &conn,
            &CreatePostParams {
                topic_id: topic.id,
                user_id: user.id,
                raw: "keep me out of it".to_string(),
                post_type: PostType::Regular,
                opted_out: true,
            },
        )
        .expect("create post failed");

        let tracked = tracked_group_ids(&conn).expect("projection failed");
        let view = load_post_view(&conn, post.id)
            .expect("load failed")
            .expect("view should exist");
        assert!(!should_track(&view, &tracked));
    }

    #[test]
    fn missing_post_loads_as_none() {
        let conn = setup_db();
        assert!(load_post_view(&conn, 123).expect("load failed").is_none());
    }

    #[test]
    fn priority_projection_requires_tracking() {
        let conn = setup_db();
        let tracked_priority = tracked_group(&conn, "navigators");
        set_group_attribute(
            &conn,
            tracked_priority,
            GroupAttribute::TrackPostsWithPriority,
            &GroupAttributeValue::Flag(true),
        )
        .expect("flag update failed");

        // Priority flag without tracking stays invisible to the projections.
        let orphan = create_group(&conn, "orphans", None).expect("group failed");
        set_group_attribute(
            &conn,
            orphan.id,
            GroupAttribute::TrackPostsWithPriority,
            &GroupAttributeValue::Flag(true),
        )
        .expect("flag update failed");

        assert_eq!(
            tracked_group_ids(&conn).expect("projection failed"),
            vec![tracked_priority]
        );
        assert_eq!(
            priority_tracked_group_ids(&conn).expect("projection failed"),
            vec![tracked_priority]
        );
    }
}
