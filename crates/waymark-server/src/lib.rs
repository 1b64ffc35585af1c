//! Waymark server library logic.

pub mod api;
pub mod api_admin;
pub mod api_forum;
pub mod api_tracker;
pub mod cache;
pub mod config;
pub mod middleware;
pub mod worker;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use cache::TrackedGroupsCache;
use middleware::RateLimiter;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use waymark_db::DbPool;
use waymark_tracker::ReconcileScope;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Shared bearer token for the mutation and admin surface.
    pub admin_token: String,
    /// Per-client request budget per minute.
    pub requests_per_minute: u32,
    /// Rate limiter state.
    pub rate_limiter: RateLimiter,
    /// Sending half of the reconciliation worker channel.
    pub reconcile_tx: mpsc::UnboundedSender<ReconcileScope>,
    /// Cache of the tracked-groups listing.
    pub tracked_groups: TrackedGroupsCache,
}

/// Maximum request body size (1 MiB). Post bodies are the largest payload
/// this API accepts.
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/topics", post(api_forum::create_topic_handler))
        .route(
            "/api/topics/{topicId}",
            delete(api_forum::delete_topic_handler),
        )
        .route(
            "/api/topics/{topicId}/posts",
            post(api_forum::create_post_handler),
        )
        .route(
            "/api/posts/{postId}/owner",
            put(api_forum::set_post_owner_handler),
        )
        .route(
            "/api/posts/{postId}/topic",
            put(api_forum::move_post_handler),
        )
        .route("/api/posts/{postId}", delete(api_forum::delete_post_handler))
        .route("/api/groups", post(api_forum::create_group_handler))
        .route(
            "/api/groups/{groupId}",
            delete(api_forum::delete_group_handler),
        )
        .route("/api/users", post(api_forum::create_user_handler))
        .route(
            "/api/users/{userId}/primary-group",
            put(api_forum::set_primary_group_handler),
        )
        .route("/api/users/{userId}", delete(api_forum::delete_user_handler))
        .route(
            "/api/admin/groups/{groupId}/{attribute}",
            put(api_admin::set_group_attribute_handler),
        )
        .layer(axum::middleware::from_fn(middleware::admin_auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/topics/{topicId}/tracked-post",
            get(api_tracker::topic_tracked_post_handler),
        )
        .route(
            "/api/topics/{topicId}/tracked-posts",
            get(api_tracker::topic_tracked_posts_handler),
        )
        .route(
            "/api/posts/{postId}/tracked-post",
            get(api_tracker::post_tracked_post_handler),
        )
        .route("/api/posts/{postId}", get(api_tracker::get_post_handler))
        .route(
            "/api/tracked-groups",
            get(api_tracker::tracked_groups_handler),
        )
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::rate_limit_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
