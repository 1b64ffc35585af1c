//! Input validation and error mapping on the forum mutation surface.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use std::net::SocketAddr;
use tower::ServiceExt;
use waymark_db::{create_pool, run_migrations, PoolSettings};
use waymark_server::{
    app, cache::TrackedGroupsCache, middleware::RateLimiter, worker::spawn_reconcile_worker,
    AppState,
};

const ADMIN_TOKEN: &str = "test-admin-token";

async fn setup_app() -> (axum::Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("waymark.db");
    let pool = create_pool(db_path.to_str().unwrap(), PoolSettings::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
    }

    let (reconcile_tx, _worker) = spawn_reconcile_worker(pool.clone());
    let state = AppState {
        pool,
        admin_token: ADMIN_TOKEN.to_string(),
        requests_per_minute: 10_000,
        rate_limiter: RateLimiter::new(),
        reconcile_tx,
        tracked_groups: TrackedGroupsCache::new(),
    };

    (app(state), dir)
}

fn authed(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    let mut request = Request::builder()
        .uri(uri)
        .method(method)
        .header("content-type", "application/json")
        .header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {ADMIN_TOKEN}"),
        )
        .body(Body::from(body.to_string()))
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 12345))));
    request
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn seed_topic(app: &axum::Router, title: &str) -> i64 {
    let (status, topic) = send(
        app,
        authed("POST", "/api/topics", serde_json::json!({"title": title})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    topic["id"].as_i64().unwrap()
}

#[tokio::test]
async fn topic_title_bounds_are_enforced() {
    let (app, _dir) = setup_app().await;

    let (status, _) = send(
        &app,
        authed("POST", "/api/topics", serde_json::json!({"title": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        authed(
            "POST",
            "/api/topics",
            serde_json::json!({"title": "x".repeat(257)}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_body_bounds_are_enforced() {
    let (app, _dir) = setup_app().await;
    let topic_id = seed_topic(&app, "bounds").await;

    let (status, _) = send(
        &app,
        authed(
            "POST",
            &format!("/api/topics/{topic_id}/posts"),
            serde_json::json!({"user_id": 1, "raw": ""}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        authed(
            "POST",
            &format!("/api/topics/{topic_id}/posts"),
            serde_json::json!({"user_id": 1, "raw": "x".repeat(64 * 1024 + 1)}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_username_is_rejected() {
    let (app, _dir) = setup_app().await;

    let (status, _) = send(
        &app,
        authed(
            "POST",
            "/api/users",
            serde_json::json!({"username": "", "primary_group_id": null}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_names_map_to_conflict() {
    let (app, _dir) = setup_app().await;

    let (status, _) = send(
        &app,
        authed("POST", "/api/groups", serde_json::json!({"name": "support"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        authed("POST", "/api/groups", serde_json::json!({"name": "support"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        authed(
            "POST",
            "/api/users",
            serde_json::json!({"username": "ada", "primary_group_id": null}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        authed(
            "POST",
            "/api/users",
            serde_json::json!({"username": "ada", "primary_group_id": null}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn posting_into_unknown_topic_is_not_found() {
    let (app, _dir) = setup_app().await;

    let (status, _) = send(
        &app,
        authed(
            "POST",
            "/api/topics/999/posts",
            serde_json::json!({"user_id": 1, "raw": "hello"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn moving_into_unknown_topic_is_not_found() {
    let (app, _dir) = setup_app().await;
    let topic_id = seed_topic(&app, "origin").await;

    let (status, post) = send(
        &app,
        authed(
            "POST",
            &format!("/api/topics/{topic_id}/posts"),
            serde_json::json!({"user_id": 1, "raw": "movable"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let post_id = post["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        authed(
            "PUT",
            &format!("/api/posts/{post_id}/topic"),
            serde_json::json!({"topic_id": 999}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mutating_unknown_records_is_not_found() {
    let (app, _dir) = setup_app().await;

    let (status, _) = send(
        &app,
        authed(
            "PUT",
            "/api/posts/999/owner",
            serde_json::json!({"user_id": 1}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        authed(
            "PUT",
            "/api/users/999/primary-group",
            serde_json::json!({"group_id": null}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        authed("DELETE", "/api/posts/999", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        authed("DELETE", "/api/topics/999", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn explicit_user_id_is_honored() {
    let (app, _dir) = setup_app().await;

    let (status, user) = send(
        &app,
        authed(
            "POST",
            "/api/users",
            serde_json::json!({"id": 42, "username": "ada", "primary_group_id": null}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["id"].as_i64(), Some(42));
}
