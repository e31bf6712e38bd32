//! Connection pool construction for the SQLite provider.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use thiserror::Error;

use crate::settings::SqliteProviderSettings;

/// A type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Errors that can occur when creating the connection pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to build the connection pool.
    #[error("failed to create sqlite connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Creates a pool whose connections come up with the provider's pragmas
/// already applied.
///
/// `target` is a filesystem path; `:memory:` works but gives every pooled
/// connection its own private database, which is rarely what a session
/// provider wants — prefer a temp file in tests.
pub(crate) fn create_pool(
    target: &str,
    settings: &SqliteProviderSettings,
) -> Result<DbPool, PoolError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

    let init_settings = settings.clone();
    let manager = SqliteConnectionManager::file(target)
        .with_flags(flags)
        .with_init(move |conn| {
            if init_settings.wal {
                // Verify the mode was accepted; in-memory databases report
                // "memory", which is expected.
                let journal_mode: String =
                    conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
                if journal_mode != "wal" && journal_mode != "memory" {
                    return Err(rusqlite::Error::SqliteFailure(
                        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                        Some(format!("could not enable WAL mode, got: {journal_mode}")),
                    ));
                }
            }
            conn.execute_batch(&format!(
                "PRAGMA foreign_keys = {};
                 PRAGMA busy_timeout = {};",
                if init_settings.foreign_keys { "ON" } else { "OFF" },
                init_settings.busy_timeout_ms
            ))
        });

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;

    Ok(pool)
}
