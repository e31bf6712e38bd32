//! HTTP handlers for the notes API.
//!
//! Handlers contain no session plumbing: they pull the ambient handle with
//! [`current_session`] and do their query work on a blocking thread. Commit
//! and rollback belong to the session layer wrapping the request.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::Json;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use unitwork::{current_session, SessionError};
use unitwork_sqlite::SqliteSessionExt;

/// Maximum length for a note title.
const MAX_TITLE_LEN: usize = 256;
/// Maximum length for a note body.
const MAX_BODY_LEN: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

fn note_from_row(row: &rusqlite::Row<'_>) -> Result<Note, rusqlite::Error> {
    Ok(Note {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn session_err_to_status(error: SessionError) -> StatusCode {
    tracing::error!(error = %error, "ambient session unavailable");
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Runs `f` against the request's session on a blocking thread.
async fn with_db<T, F>(f: F) -> Result<T, StatusCode>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
{
    let handle = current_session().map_err(session_err_to_status)?;

    tokio::task::spawn_blocking(move || {
        handle
            .with_connection(f)
            .map_err(session_err_to_status)?
            .map_err(|error| {
                tracing::error!(error = %error, "database operation failed");
                StatusCode::INTERNAL_SERVER_ERROR
            })
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
}

/// POST /api/notes
pub async fn create_note_handler(
    Json(payload): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), StatusCode> {
    if payload.title.is_empty() || payload.title.len() > MAX_TITLE_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }
    if payload.body.len() > MAX_BODY_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let note = with_db(move |conn| {
        conn.query_row(
            "INSERT INTO notes (title, body) VALUES (?1, ?2)
             RETURNING id, title, body, created_at",
            params![payload.title, payload.body],
            note_from_row,
        )
    })
    .await?;

    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /api/notes
pub async fn list_notes_handler() -> Result<Json<Vec<Note>>, StatusCode> {
    let notes = with_db(|conn| {
        let mut stmt =
            conn.prepare("SELECT id, title, body, created_at FROM notes ORDER BY id DESC")?;
        let rows = stmt.query_map([], note_from_row)?;
        rows.collect::<Result<Vec<_>, _>>()
    })
    .await?;

    Ok(Json(notes))
}

/// GET /api/notes/{noteId}
pub async fn get_note_handler(Path(note_id): Path<i64>) -> Result<Json<Note>, StatusCode> {
    let note = with_db(move |conn| {
        conn.query_row(
            "SELECT id, title, body, created_at FROM notes WHERE id = ?1",
            params![note_id],
            note_from_row,
        )
        .optional()
    })
    .await?;

    note.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// DELETE /api/notes/{noteId}
pub async fn delete_note_handler(Path(note_id): Path<i64>) -> Result<StatusCode, StatusCode> {
    let deleted = with_db(move |conn| {
        conn.execute("DELETE FROM notes WHERE id = ?1", params![note_id])
    })
    .await?;

    if deleted == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(StatusCode::NO_CONTENT)
}
