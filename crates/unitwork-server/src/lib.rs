//! Notes server library logic.
//!
//! A small demonstration service for the `unitwork` session layer: every
//! request runs inside a session scope, handlers reach the database through
//! the ambient handle, and a retention task exercises the manual scope API.

pub mod api;
pub mod background;
pub mod config;
pub mod schema;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use unitwork::SessionManager;
use unitwork_axum::SessionLayer;

/// Health check handler.
///
/// Returns `200 OK` with server status and version. Used by load balancers,
/// monitoring, and CI to verify the server is running.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
///
/// The session layer sits closest to the routes so every handler, and
/// nothing outside the request, runs inside a session scope.
pub fn app(manager: Arc<SessionManager>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/notes",
            post(api::create_note_handler).get(api::list_notes_handler),
        )
        .route(
            "/api/notes/{noteId}",
            get(api::get_note_handler).delete(api::delete_note_handler),
        )
        .layer(SessionLayer::new(manager))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
