//! Forum mutation handlers: the event sources of the tracking engine.
//!
//! Each handler persists its mutation, asks the dispatcher which
//! reconciliation scopes the mutation requires, and enqueues them on the
//! worker channel after the write committed. The request never waits on
//! reconciliation.

use crate::api::{forum_error, join_error, pool_error, tracker_error, ApiError};
use crate::worker::enqueue_scopes;
use crate::AppState;
use axum::extract::{Extension, Json, Path};
use serde::Deserialize;
use std::sync::Arc;
use waymark_forum::{
    create_group, create_post, create_topic, create_user, delete_group, delete_user, move_post,
    set_post_owner, set_primary_group, soft_delete_post, soft_delete_topic, CreatePostParams,
    Group, Post, Topic, User,
};
use waymark_tracker::dispatch;
use waymark_types::{Archetype, PostType};

/// Maximum length for a topic title.
const MAX_TITLE_LEN: usize = 256;
/// Maximum length for a post body.
const MAX_RAW_LEN: usize = 64 * 1024;
/// Maximum length for a username.
const MAX_USERNAME_LEN: usize = 64;
/// Maximum length for a group name.
const MAX_GROUP_NAME_LEN: usize = 128;
/// Maximum length for a group full name.
const MAX_FULL_NAME_LEN: usize = 256;

#[derive(Deserialize)]
pub struct CreateTopicRequest {
    pub title: String,
    pub archetype: Option<Archetype>,
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub user_id: i64,
    pub raw: String,
    pub post_type: Option<PostType>,
    #[serde(default)]
    pub opted_out: bool,
}

#[derive(Deserialize)]
pub struct SetPostOwnerRequest {
    pub user_id: i64,
}

#[derive(Deserialize)]
pub struct MovePostRequest {
    pub topic_id: i64,
}

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub id: Option<i64>,
    pub username: String,
    pub primary_group_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct SetPrimaryGroupRequest {
    pub group_id: Option<i64>,
}

/// POST /api/topics
pub async fn create_topic_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<Json<Topic>, ApiError> {
    if payload.title.is_empty() || payload.title.len() > MAX_TITLE_LEN {
        return Err(ApiError::BadRequest("invalid topic title".to_string()));
    }
    let archetype = payload.archetype.unwrap_or(Archetype::Regular);

    let pool = state.pool.clone();
    let topic = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        create_topic(&conn, &payload.title, archetype).map_err(forum_error)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(topic))
}

/// DELETE /api/topics/{topicId}
///
/// Soft delete. No scope is enqueued: a deleted topic stops producing
/// eligible rows and the next full run prunes its annotations.
pub async fn delete_topic_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(topic_id): Path<i64>,
) -> Result<Json<Topic>, ApiError> {
    let pool = state.pool.clone();
    let topic = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        soft_delete_topic(&conn, topic_id).map_err(forum_error)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(topic))
}

/// POST /api/topics/{topicId}/posts
pub async fn create_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(topic_id): Path<i64>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    if payload.raw.is_empty() || payload.raw.len() > MAX_RAW_LEN {
        return Err(ApiError::BadRequest("invalid post body".to_string()));
    }

    let pool = state.pool.clone();
    let (post, scopes) = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        let params = CreatePostParams {
            topic_id,
            user_id: payload.user_id,
            raw: payload.raw,
            post_type: payload.post_type.unwrap_or(PostType::Regular),
            opted_out: payload.opted_out,
        };
        let post = create_post(&conn, &params).map_err(forum_error)?;
        let scopes = dispatch::on_post_created(&conn, post.id).map_err(tracker_error)?;
        Ok::<_, ApiError>((post, scopes))
    })
    .await
    .map_err(join_error)??;

    enqueue_scopes(&state.reconcile_tx, scopes);
    Ok(Json(post))
}

/// PUT /api/posts/{postId}/owner
pub async fn set_post_owner_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(post_id): Path<i64>,
    Json(payload): Json<SetPostOwnerRequest>,
) -> Result<Json<Post>, ApiError> {
    let pool = state.pool.clone();
    let (post, scopes) = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        let change = set_post_owner(&conn, post_id, payload.user_id).map_err(forum_error)?;
        let scopes =
            dispatch::on_post_author_changed(&conn, change.post.id, change.previous_user_id)
                .map_err(tracker_error)?;
        Ok::<_, ApiError>((change.post, scopes))
    })
    .await
    .map_err(join_error)??;

    enqueue_scopes(&state.reconcile_tx, scopes);
    Ok(Json(post))
}

/// PUT /api/posts/{postId}/topic
pub async fn move_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(post_id): Path<i64>,
    Json(payload): Json<MovePostRequest>,
) -> Result<Json<Post>, ApiError> {
    let pool = state.pool.clone();
    let (post, scopes) = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        let moved = move_post(&conn, post_id, payload.topic_id).map_err(forum_error)?;
        let scopes = if moved.post.topic_id == moved.source_topic_id {
            // Move into the current topic changed nothing.
            Vec::new()
        } else {
            dispatch::on_post_moved(&conn, moved.post.id, moved.source_topic_id)
                .map_err(tracker_error)?
        };
        Ok::<_, ApiError>((moved.post, scopes))
    })
    .await
    .map_err(join_error)??;

    enqueue_scopes(&state.reconcile_tx, scopes);
    Ok(Json(post))
}

/// DELETE /api/posts/{postId}
pub async fn delete_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(post_id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    let pool = state.pool.clone();
    let (post, scopes) = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        // The gate looks at the pre-delete state; a deleted post is never
        // tracked.
        let scopes = dispatch::on_post_destroyed(&conn, post_id).map_err(tracker_error)?;
        let post = soft_delete_post(&conn, post_id).map_err(forum_error)?;
        Ok::<_, ApiError>((post, scopes))
    })
    .await
    .map_err(join_error)??;

    enqueue_scopes(&state.reconcile_tx, scopes);
    Ok(Json(post))
}

/// POST /api/groups
pub async fn create_group_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<Json<Group>, ApiError> {
    if payload.name.is_empty() || payload.name.len() > MAX_GROUP_NAME_LEN {
        return Err(ApiError::BadRequest("invalid group name".to_string()));
    }
    if let Some(ref full_name) = payload.full_name {
        if full_name.len() > MAX_FULL_NAME_LEN {
            return Err(ApiError::BadRequest("group full name too long".to_string()));
        }
    }

    let pool = state.pool.clone();
    let group = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        create_group(&conn, &payload.name, payload.full_name.as_deref()).map_err(forum_error)
    })
    .await
    .map_err(join_error)??;

    state.tracked_groups.invalidate();
    Ok(Json(group))
}

/// DELETE /api/groups/{groupId}
pub async fn delete_group_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(group_id): Path<i64>,
) -> Result<Json<Group>, ApiError> {
    let pool = state.pool.clone();
    let group = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        delete_group(&conn, group_id).map_err(forum_error)
    })
    .await
    .map_err(join_error)??;

    state.tracked_groups.invalidate();
    enqueue_scopes(
        &state.reconcile_tx,
        dispatch::on_group_destroyed(group.track_posts),
    );
    Ok(Json(group))
}

/// POST /api/users
pub async fn create_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<User>, ApiError> {
    if payload.username.is_empty() || payload.username.len() > MAX_USERNAME_LEN {
        return Err(ApiError::BadRequest("invalid username".to_string()));
    }

    let pool = state.pool.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        create_user(
            &conn,
            payload.id,
            &payload.username,
            payload.primary_group_id,
        )
        .map_err(forum_error)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(user))
}

/// PUT /api/users/{userId}/primary-group
pub async fn set_primary_group_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Json(payload): Json<SetPrimaryGroupRequest>,
) -> Result<Json<User>, ApiError> {
    let pool = state.pool.clone();
    let (user, scopes) = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        let change = set_primary_group(&conn, user_id, payload.group_id).map_err(forum_error)?;
        let scopes = dispatch::on_user_primary_group_changed(
            &conn,
            change.previous_group_id,
            change.user.primary_group_id,
        )
        .map_err(tracker_error)?;
        Ok::<_, ApiError>((change.user, scopes))
    })
    .await
    .map_err(join_error)??;

    enqueue_scopes(&state.reconcile_tx, scopes);
    Ok(Json(user))
}

/// DELETE /api/users/{userId}
///
/// Posts keep the dangling author id; they stop being eligible and fall
/// out of the annotations on the next run that covers their topics.
pub async fn delete_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let pool = state.pool.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(pool_error)?;
        delete_user(&conn, user_id).map_err(forum_error)
    })
    .await
    .map_err(join_error)??;

    Ok(Json(user))
}
