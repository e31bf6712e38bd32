//! The SQLite session: one pooled connection, one open transaction.

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use unitwork::{BackendError, Session, SessionError, SessionHandle};

use crate::settings::{SqliteSessionSettings, TransactionBehavior};

#[derive(Debug, thiserror::Error)]
#[error("sqlite session used after close")]
struct SessionClosed;

#[derive(Debug, thiserror::Error)]
#[error("the active session does not belong to the sqlite provider")]
struct NotASqliteSession;

/// A live SQLite unit of work.
///
/// The connection carries an open transaction from creation until the
/// owning scope finalizes. Committing (or rolling back) through the
/// [`Session`] trait mid-scope immediately opens a fresh transaction with
/// the same locking behavior, so the session keeps its unit-of-work
/// guarantee until close.
pub struct SqliteSession {
    conn: Option<PooledConnection<SqliteConnectionManager>>,
    behavior: TransactionBehavior,
    query_only: bool,
    tx_open: bool,
}

impl SqliteSession {
    pub(crate) fn begin(
        conn: PooledConnection<SqliteConnectionManager>,
        settings: SqliteSessionSettings,
    ) -> Result<Self, rusqlite::Error> {
        if settings.query_only {
            conn.pragma_update(None, "query_only", true)?;
        }
        conn.execute_batch(settings.behavior.begin_sql())?;
        Ok(Self {
            conn: Some(conn),
            behavior: settings.behavior,
            query_only: settings.query_only,
            tx_open: true,
        })
    }

    /// The underlying connection, or `None` after close.
    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_deref()
    }
}

impl Session for SqliteSession {
    fn commit(&mut self) -> Result<(), BackendError> {
        let conn = self.conn.as_ref().ok_or(SessionClosed)?;
        conn.execute_batch("COMMIT")?;
        self.tx_open = false;
        conn.execute_batch(self.behavior.begin_sql())?;
        self.tx_open = true;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), BackendError> {
        let conn = self.conn.as_ref().ok_or(SessionClosed)?;
        conn.execute_batch("ROLLBACK")?;
        self.tx_open = false;
        conn.execute_batch(self.behavior.begin_sql())?;
        self.tx_open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        // Best effort on both cleanup steps; the connection goes back to
        // the pool either way, so a stale pragma must not survive a failed
        // rollback (or vice versa).
        let mut first_error: Option<rusqlite::Error> = None;
        if self.tx_open {
            if let Err(error) = conn.execute_batch("ROLLBACK") {
                first_error = Some(error);
            }
            self.tx_open = false;
        }
        if self.query_only {
            if let Err(error) = conn.pragma_update(None, "query_only", false) {
                first_error.get_or_insert(error);
            }
        }
        drop(conn); // hands the connection back to the pool

        match first_error {
            Some(error) => Err(Box::new(error)),
            None => Ok(()),
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Handle extension for reaching the session's pooled connection.
pub trait SqliteSessionExt {
    /// Runs `f` with the live SQLite connection.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Closed`] once the owning scope has finalized.
    /// - [`SessionError::Backend`] if the active session was produced by a
    ///   different provider.
    fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> R) -> Result<R, SessionError>;
}

impl SqliteSessionExt for SessionHandle {
    fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> R) -> Result<R, SessionError> {
        self.with_session(|session| {
            let sqlite = session
                .as_any_mut()
                .downcast_mut::<SqliteSession>()
                .ok_or_else(|| SessionError::Backend(Box::new(NotASqliteSession)))?;
            let conn = sqlite.connection().ok_or(SessionError::Closed)?;
            Ok(f(conn))
        })?
    }
}
