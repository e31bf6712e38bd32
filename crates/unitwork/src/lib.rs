//! Request-scoped unit-of-work session management.
//!
//! One logical unit of work (typically one HTTP request) gets at most one
//! database session, reachable from anywhere in its call graph without
//! parameter threading, and finalized exactly once when the scope ends:
//! commit on success, rollback on failure, rollback on panic or task abort.
//!
//! # Design decisions
//!
//! - **Task-local ambient slot**: the active session handle lives in a
//!   `tokio::task_local!` binding installed for the duration of a scope.
//!   Concurrent requests each see their own binding; nothing is shared
//!   through process globals except a write-once "a manager exists" flag
//!   used to tell a wiring bug apart from an out-of-scope call.
//! - **Lazy session construction**: entering a scope allocates no database
//!   resources. The session is created on the first [`current_session`]
//!   call, so request paths that never touch the database cost nothing.
//! - **Injected backend**: the core knows nothing about any concrete
//!   database. A [`SessionProvider`] manufactures [`Session`] objects that
//!   support commit/rollback/close; everything else is the backend's
//!   business.
//! - **Guaranteed finalization**: the owning scope holds a drop guard, so
//!   rollback runs even when the protected future is cancelled or panics,
//!   not only on the explicit error path.
//!
//! # Usage
//!
//! ```rust,ignore
//! let manager = SessionManager::builder()
//!     .connection_target("app.db")
//!     .build_with(SqliteProvider::connector())?;
//!
//! manager.scope(async {
//!     let session = unitwork::current_session()?;
//!     // ... use the session ...
//!     Ok::<_, unitwork::SessionError>(())
//! }).await?;
//! ```

mod ambient;
mod config;
mod error;
mod handle;
mod options;
mod provider;
mod scope;

pub use config::SessionConfig;
pub use error::{BackendError, ConfigError, ScopeError, SessionError};
pub use handle::SessionHandle;
pub use options::OptionMap;
pub use provider::{Session, SessionProvider};
pub use scope::{current_session, ScopeOptions, SessionManager, SessionManagerBuilder};

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;
