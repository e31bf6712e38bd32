//! Injected backend contracts: session factories and live sessions.

use std::any::Any;

use crate::error::{BackendError, ConfigError};
use crate::options::OptionMap;

/// A live unit-of-work session.
///
/// Produced by a [`SessionProvider`], held by exactly one scope, and
/// finalized exactly once by that scope. `commit`, `rollback`, and `close`
/// may block; the scope manager calls them off the async worker threads on
/// the normal exit path.
pub trait Session: Send {
    /// Commits the current transaction.
    fn commit(&mut self) -> Result<(), BackendError>;

    /// Rolls back the current transaction.
    fn rollback(&mut self) -> Result<(), BackendError>;

    /// Releases underlying resources. Called exactly once, after the final
    /// commit or rollback; must be idempotent.
    fn close(&mut self) -> Result<(), BackendError>;

    /// Backend-specific access, used by extension traits to downcast to the
    /// concrete session type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Factory for [`Session`]s.
///
/// Constructed once from a connection descriptor and provider options,
/// immutable afterwards, and shared read-only across all concurrent scopes.
pub trait SessionProvider: Send + Sync {
    /// Constructs a new session using the merged option set for the scope
    /// that triggered creation. Pure factory call; touches no shared state
    /// beyond the provider's own resources.
    fn new_session(&self, options: &OptionMap) -> Result<Box<dyn Session>, BackendError>;

    /// Validates a session option map at manager construction time, so bad
    /// defaults fail startup instead of the first request.
    ///
    /// The default implementation accepts everything; backends with a fixed
    /// option vocabulary should override it.
    fn validate_session_options(&self, options: &OptionMap) -> Result<(), ConfigError> {
        let _ = options;
        Ok(())
    }
}
