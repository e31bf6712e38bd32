//! Request-pipeline behavior of the session layer.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use unitwork::test_util::{Counters, CountingProvider};
use unitwork::{current_session, SessionManager};
use unitwork_axum::SessionLayer;

fn manager_with_counters(commit_on_exit: bool) -> (Arc<SessionManager>, Arc<Counters>) {
    let provider = CountingProvider::new();
    let counters = provider.counters();
    let manager = SessionManager::builder()
        .provider(Arc::new(provider))
        .commit_on_exit(commit_on_exit)
        .build()
        .expect("manager should build");
    (Arc::new(manager), counters)
}

async fn touch_handler() -> StatusCode {
    match current_session() {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn reject_handler() -> (StatusCode, &'static str) {
    current_session().expect("the layer should provide a scope");
    (StatusCode::UNPROCESSABLE_ENTITY, "rejected")
}

async fn explode_handler() -> StatusCode {
    current_session().expect("the layer should provide a scope");
    panic!("handler exploded");
}

fn app(manager: Arc<SessionManager>) -> Router {
    Router::new()
        .route("/touch", get(touch_handler))
        .route("/untouched", get(|| async { "ok" }))
        .route("/reject", get(reject_handler))
        .route("/explode", get(explode_handler))
        .layer(SessionLayer::new(manager))
        // Outermost, so panics unwind through the session layer first.
        .layer(CatchPanicLayer::new())
}

async fn send(app: Router, uri: &str) -> StatusCode {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("the service is infallible");
    response.status()
}

#[tokio::test]
async fn handler_reaches_a_session_and_the_scope_commits() {
    let (manager, counters) = manager_with_counters(true);

    let status = send(app(manager), "/touch").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(counters.created(), 1);
    assert_eq!(counters.commits(), 1);
    assert_eq!(counters.rollbacks(), 0);
    assert_eq!(counters.closes(), 1);
}

#[tokio::test]
async fn untouched_request_constructs_no_session() {
    let (manager, counters) = manager_with_counters(true);

    let status = send(app(manager), "/untouched").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(counters.created(), 0);
    assert_eq!(counters.commits(), 0);
}

#[tokio::test]
async fn panicking_handler_rolls_back() {
    let (manager, counters) = manager_with_counters(true);

    let status = send(app(manager), "/explode").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(counters.rollbacks(), 1);
    assert_eq!(counters.commits(), 0);
    assert_eq!(counters.closes(), 1);
}

#[tokio::test]
async fn error_response_is_still_a_completed_response() {
    let (manager, counters) = manager_with_counters(true);

    let status = send(app(manager), "/reject").await;

    // A 4xx built by the handler is a normal completion: the scope commits.
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(counters.commits(), 1);
    assert_eq!(counters.rollbacks(), 0);
}

#[tokio::test]
async fn commit_on_exit_false_closes_without_committing() {
    let (manager, counters) = manager_with_counters(false);

    let status = send(app(manager), "/touch").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(counters.commits(), 0);
    assert_eq!(counters.rollbacks(), 0);
    assert_eq!(counters.closes(), 1);
}

#[tokio::test]
async fn finalization_failure_surfaces_as_a_500() {
    let (manager, counters) = manager_with_counters(true);
    counters.fail_commit.store(true, Ordering::SeqCst);

    let status = send(app(manager), "/touch").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(counters.closes(), 1, "close runs even when commit fails");
}
