//! Background tasks for the notes server.
//!
//! Includes:
//! - Purging notes older than the configured retention window.

use std::sync::Arc;

use tokio::time::{sleep, Duration};
use unitwork::{current_session, SessionManager};
use unitwork_sqlite::SqliteSessionExt;

/// Starts the note purge task.
///
/// Runs indefinitely. Each run opens its own manual session scope, so a
/// purge is committed atomically when the delete succeeds and rolled back
/// if anything fails mid-way — the same guarantees request handlers get.
pub async fn start_purge_task(
    manager: Arc<SessionManager>,
    purge_after_days: u32,
    check_interval: Duration,
) {
    if purge_after_days == 0 {
        tracing::warn!("note purge task disabled (purge_after_days=0)");
        return;
    }

    tracing::info!(
        purge_after_days,
        interval_seconds = check_interval.as_secs(),
        "starting note purge task"
    );

    loop {
        sleep(check_interval).await;

        let result = manager
            .scope(async {
                let handle = current_session().map_err(|e| e.to_string())?;
                let days = i64::from(purge_after_days);

                tokio::task::spawn_blocking(move || {
                    handle
                        .with_connection(|conn| {
                            conn.execute(
                                "DELETE FROM notes WHERE created_at < datetime('now', ?1)",
                                rusqlite::params![format!("-{days} days")],
                            )
                        })
                        .map_err(|e| e.to_string())?
                        .map_err(|e| e.to_string())
                })
                .await
                .map_err(|e| e.to_string())?
            })
            .await;

        match result {
            Ok(purged) => {
                if purged > 0 {
                    tracing::info!(count = purged, "purged old notes");
                }
            }
            Err(error) => {
                tracing::error!(error = %error, "note purge run failed");
            }
        }
    }
}
