//! Error taxonomy for the unit-of-work layer.
//!
//! Construction-time problems ([`ConfigError`]) are fatal to setup and never
//! retried. Runtime problems split into the two ambient-lookup signals
//! (manager never installed vs. call outside any scope) and boxed backend
//! failures, which are passed through unmodified.

use thiserror::Error;

/// Boxed error produced by a session backend.
///
/// Backends surface their native error types through this alias so callers
/// see the real failure, not a translation of it.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while validating unit-of-work configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither a connection target nor a prebuilt provider was supplied.
    #[error("you need to supply a connection target or a prebuilt session provider")]
    MissingConnectionTarget,

    /// Both a connection target and a prebuilt provider were supplied.
    #[error("connection target and prebuilt session provider are mutually exclusive")]
    ConflictingProviders,

    /// A connection target was supplied to a build path that has no
    /// connector capable of opening it.
    #[error("a connection target was supplied but no connector is available; use build_with")]
    ConnectorRequired,

    /// An option map contained a key the backend does not recognise.
    #[error("unrecognized configuration key `{key}`")]
    UnknownKey {
        /// The offending key, verbatim.
        key: String,
    },

    /// An option map had recognised keys but malformed values.
    #[error("invalid configuration options: {0}")]
    InvalidOptions(String),

    /// The backend failed while constructing the provider.
    #[error("failed to construct session provider: {0}")]
    Provider(#[source] BackendError),
}

/// Errors raised while resolving or finalizing the ambient session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session manager has ever been constructed in this process.
    /// Signals a wiring bug: install the pipeline layer or build a
    /// [`SessionManager`](crate::SessionManager) before accessing sessions.
    #[error(
        "session manager not initialised; construct a SessionManager or install \
         the session layer before accessing the session"
    )]
    NotInitialised,

    /// A manager exists, but the call site is outside any open scope.
    #[error("no session scope is active; the call site is outside any request or manual scope")]
    MissingSession,

    /// The handle was already finalized by its owning scope.
    #[error("session already finalized by its owning scope")]
    Closed,

    /// The backend failed while creating or finalizing a session.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Outcome of running a fallible unit of work inside a scope.
///
/// `E` is the error type of the protected work itself. The scope never
/// swallows it: a rollback that succeeds re-surfaces the original error
/// unchanged, and a rollback that fails keeps the original attached.
#[derive(Debug, Error)]
pub enum ScopeError<E> {
    /// The unit of work failed. The session (if one was created) has been
    /// rolled back; this is the original error, unchanged.
    #[error("{0}")]
    Task(E),

    /// The unit of work succeeded but commit or close failed.
    #[error("session finalization failed: {0}")]
    Finalize(#[source] SessionError),

    /// Rollback (or the close that follows it) failed while handling a
    /// unit-of-work error. The original error is attached, not discarded.
    #[error("rollback failed while handling a unit-of-work error: {rollback}")]
    RollbackFailed {
        /// The rollback failure.
        #[source]
        rollback: SessionError,
        /// The original unit-of-work error that triggered the rollback.
        task: E,
    },
}

impl<E> ScopeError<E> {
    /// Returns the original unit-of-work error, if this outcome carries one.
    pub fn into_task(self) -> Option<E> {
        match self {
            Self::Task(task) | Self::RollbackFailed { task, .. } => Some(task),
            Self::Finalize(_) => None,
        }
    }
}
