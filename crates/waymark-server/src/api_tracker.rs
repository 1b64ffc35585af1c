//! Read surface for tracked-post annotations.
//!
//! These routes are open: the annotations exist to be read by UIs. A
//! missing annotation is a value (`null`), not an error; only unknown
//! topic and post ids produce 404.

use crate::api::{forum_error, join_error, pool_error, tracker_error, ApiError};
use crate::AppState;
use axum::extract::{Extension, Json, Path};
use std::sync::Arc;
use waymark_forum::{get_post, get_topic, list_tracked_groups, Post, TrackedGroup};
use waymark_tracker::store;
use waymark_types::TrackedPost;

/// GET /api/topics/{topicId}/tracked-post
pub async fn topic_tracked_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(topic_id): Path<i64>,
) -> Result<Json<Option<TrackedPost>>, ApiError> {
    let pool = state.pool.clone();
    let annotation = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        get_topic(&conn, topic_id).map_err(forum_error)?;
        store::topic_annotation(&conn, topic_id).map_err(tracker_error)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(annotation))
}

/// GET /api/posts/{postId}/tracked-post
pub async fn post_tracked_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(post_id): Path<i64>,
) -> Result<Json<Option<TrackedPost>>, ApiError> {
    let pool = state.pool.clone();
    let annotation = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        get_post(&conn, post_id).map_err(forum_error)?;
        store::post_annotation(&conn, post_id).map_err(tracker_error)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(annotation))
}

/// GET /api/topics/{topicId}/tracked-posts
///
/// The topic's annotation first, then each annotated post's record in
/// ascending post id order. Together they walk the whole tracked chain.
pub async fn topic_tracked_posts_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(topic_id): Path<i64>,
) -> Result<Json<Vec<TrackedPost>>, ApiError> {
    let pool = state.pool.clone();
    let records = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        get_topic(&conn, topic_id).map_err(forum_error)?;

        let mut records = Vec::new();
        if let Some(first) = store::topic_annotation(&conn, topic_id).map_err(tracker_error)? {
            records.push(first);
        }
        let chain =
            store::post_annotations_in_scope(&conn, Some(topic_id)).map_err(tracker_error)?;
        records.extend(chain.into_values());
        Ok::<_, ApiError>(records)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(records))
}

/// GET /api/posts/{postId}
pub async fn get_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(post_id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    let pool = state.pool.clone();
    let post = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        get_post(&conn, post_id).map_err(forum_error)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(post))
}

/// GET /api/tracked-groups
///
/// Served from the process-wide cache; a miss loads from the database and
/// fills it.
pub async fn tracked_groups_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<TrackedGroup>>, ApiError> {
    if let Some(groups) = state.tracked_groups.get() {
        return Ok(Json(groups));
    }

    let pool = state.pool.clone();
    let groups = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        list_tracked_groups(&conn).map_err(forum_error)
    })
    .await
    .map_err(join_error)??;

    state.tracked_groups.fill(groups.clone());
    Ok(Json(groups))
}
