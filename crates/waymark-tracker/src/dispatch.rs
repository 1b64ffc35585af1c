//! Maps forum mutations to the reconciliation scopes they require.
//!
//! Each function corresponds to one mutation the HTTP layer performs and
//! returns the scopes to enqueue, possibly none. Post-level events resolve
//! to single-topic scopes; group membership and group attribute events
//! resolve to full runs, since they can affect any number of topics.

use rusqlite::{Connection, OptionalExtension};
use waymark_types::{Archetype, GroupAttribute};

use crate::policy::{self, load_post_view};
use crate::{ReconcileScope, TrackerError};

/// Scopes required after a post was created.
pub fn on_post_created(
    conn: &Connection,
    post_id: i64,
) -> Result<Vec<ReconcileScope>, TrackerError> {
    let Some(view) = load_post_view(conn, post_id)? else {
        return Ok(Vec::new());
    };
    let tracked = policy::tracked_group_ids(conn)?;
    if policy::should_track(&view, &tracked) {
        Ok(vec![ReconcileScope::Topic(view.topic_id)])
    } else {
        Ok(Vec::new())
    }
}

/// Scopes required after a post changed owner.
///
/// Fires when the topic is not a private message, at least one of the two
/// owners is a genuine account, and at least one of their primary groups
/// is tracked. The gate is looser than [`policy::should_track`]: handing
/// a tracked author's post to an untracked owner also triggers a run,
/// which withdraws the stale annotations.
pub fn on_post_author_changed(
    conn: &Connection,
    post_id: i64,
    previous_user_id: i64,
) -> Result<Vec<ReconcileScope>, TrackerError> {
    let Some(view) = load_post_view(conn, post_id)? else {
        return Ok(Vec::new());
    };
    if view.archetype == Archetype::PrivateMessage {
        return Ok(Vec::new());
    }
    if previous_user_id <= 0 && view.author_id <= 0 {
        return Ok(Vec::new());
    }

    let tracked = policy::tracked_group_ids(conn)?;
    let previous_group = primary_group_of(conn, previous_user_id)?;
    let involved = group_is_tracked(previous_group, &tracked)
        || group_is_tracked(view.author_primary_group_id, &tracked);
    if involved {
        Ok(vec![ReconcileScope::Topic(view.topic_id)])
    } else {
        Ok(Vec::new())
    }
}

/// Scopes required after a post moved between topics.
///
/// When the post is trackable where it landed, both the source and the
/// destination topic need a run: the source may lose its annotation, the
/// destination may gain one.
pub fn on_post_moved(
    conn: &Connection,
    post_id: i64,
    previous_topic_id: i64,
) -> Result<Vec<ReconcileScope>, TrackerError> {
    let Some(view) = load_post_view(conn, post_id)? else {
        return Ok(Vec::new());
    };
    let tracked = policy::tracked_group_ids(conn)?;
    if policy::should_track(&view, &tracked) {
        Ok(vec![
            ReconcileScope::Topic(previous_topic_id),
            ReconcileScope::Topic(view.topic_id),
        ])
    } else {
        Ok(Vec::new())
    }
}

/// Scopes required when a post is about to be destroyed.
///
/// Must be called before the deletion is persisted: the question is
/// whether the post *was* tracked, and a deleted post never is.
pub fn on_post_destroyed(
    conn: &Connection,
    post_id: i64,
) -> Result<Vec<ReconcileScope>, TrackerError> {
    let Some(view) = load_post_view(conn, post_id)? else {
        return Ok(Vec::new());
    };
    let tracked = policy::tracked_group_ids(conn)?;
    if policy::should_track(&view, &tracked) {
        Ok(vec![ReconcileScope::Topic(view.topic_id)])
    } else {
        Ok(Vec::new())
    }
}

/// Scopes required after a user's primary group changed.
///
/// The user's posts can sit in any topic, so any involvement of a tracked
/// group on either side forces a full run.
pub fn on_user_primary_group_changed(
    conn: &Connection,
    previous_group_id: Option<i64>,
    new_group_id: Option<i64>,
) -> Result<Vec<ReconcileScope>, TrackerError> {
    let tracked = policy::tracked_group_ids(conn)?;
    if group_is_tracked(previous_group_id, &tracked) || group_is_tracked(new_group_id, &tracked) {
        Ok(vec![ReconcileScope::All])
    } else {
        Ok(Vec::new())
    }
}

/// Scopes required after a group attribute was written.
///
/// Only the two tracking flags change which posts are eligible; the
/// presentation attributes never schedule a run.
pub fn on_group_attribute_changed(attribute: GroupAttribute) -> Vec<ReconcileScope> {
    if attribute.triggers_reconcile() {
        vec![ReconcileScope::All]
    } else {
        Vec::new()
    }
}

/// Scopes required after a group was destroyed.
///
/// `was_tracked` is the flag as it stood before deletion.
pub fn on_group_destroyed(was_tracked: bool) -> Vec<ReconcileScope> {
    if was_tracked {
        vec![ReconcileScope::All]
    } else {
        Vec::new()
    }
}

fn group_is_tracked(group_id: Option<i64>, tracked: &[i64]) -> bool {
    group_id.is_some_and(|id| tracked.contains(&id))
}

/// The previous owner's primary group, flattening a missing account to
/// `None`.
fn primary_group_of(conn: &Connection, user_id: i64) -> Result<Option<i64>, TrackerError> {
    let group = conn
        .query_row(
            "SELECT primary_group_id FROM users WHERE id = ?1",
            [user_id],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()?;
    Ok(group.flatten())
}
