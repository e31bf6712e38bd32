//! Integration tests for the notes API over the session layer.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use unitwork::SessionManager;
use unitwork_server::{app, schema};
use unitwork_sqlite::SqliteProvider;

fn setup_app(dir: &TempDir, commit_on_exit: bool) -> Router {
    let path = dir.path().join("notes.db");
    let provider = SqliteProvider::connect(
        path.to_str().expect("utf-8 path"),
        &unitwork::OptionMap::new(),
    )
    .expect("provider should connect");

    {
        let conn = provider.pool().get().expect("should get a connection");
        schema::init_schema(&conn).expect("schema should apply");
    }

    let manager = Arc::new(
        SessionManager::builder()
            .provider(provider)
            .commit_on_exit(commit_on_exit)
            .build()
            .expect("manager should build"),
    );

    app(manager)
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("request should build"),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request should build"),
    };

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("the service is infallible");
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, value)
}

#[tokio::test]
async fn health_check_returns_ok() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = setup_app(&dir, true);

    let (status, body) = send_json(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn created_notes_persist_across_requests() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = setup_app(&dir, true);

    let (status, created) = send_json(
        &app,
        "POST",
        "/api/notes",
        Some(r#"{"title": "first", "body": "hello"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "first");
    let id = created["id"].as_i64().expect("id should be numeric");

    // A separate request — a separate scope and session — sees the commit.
    let (status, listed) = send_json(&app, "GET", "/api/notes", None).await;
    assert_eq!(status, StatusCode::OK);
    let notes = listed.as_array().expect("list should be an array");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["body"], "hello");

    let (status, fetched) = send_json(&app, "GET", &format!("/api/notes/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);
}

#[tokio::test]
async fn missing_note_is_404() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = setup_app(&dir, true);

    let (status, _) = send_json(&app, "GET", "/api/notes/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, "DELETE", "/api/notes/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_the_note() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = setup_app(&dir, true);

    let (_, created) = send_json(
        &app,
        "POST",
        "/api/notes",
        Some(r#"{"title": "short-lived"}"#),
    )
    .await;
    let id = created["id"].as_i64().expect("id should be numeric");

    let (status, _) = send_json(&app, "DELETE", &format!("/api/notes/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(&app, "GET", &format!("/api/notes/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blank_title_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = setup_app(&dir, true);

    let (status, _) = send_json(&app, "POST", "/api/notes", Some(r#"{"title": ""}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = send_json(&app, "GET", "/api/notes", None).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn commit_on_exit_false_discards_request_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = setup_app(&dir, false);

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/notes",
        Some(r#"{"title": "ephemeral"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // With commit-on-exit disabled nothing was committed, so the next
    // request's fresh session sees an empty table.
    let (_, listed) = send_json(&app, "GET", "/api/notes", None).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(0));
}
