//! The shared handle wrapping one scope's live session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::SessionError;
use crate::provider::Session;

/// How the owning scope finalizes its session on exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FinalizeMode {
    /// Commit, then close.
    Commit,
    /// Roll back, then close.
    Rollback,
    /// Close without committing or rolling back (commit-on-exit disabled).
    CloseOnly,
}

/// A cloneable reference to the scope's session.
///
/// Clones share the same underlying session; they exist so the handle can be
/// moved into `spawn_blocking` closures and helper functions within one
/// logical execution. A handle never crosses to another request's task.
///
/// Once the owning scope exits, every clone observes [`SessionError::Closed`].
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Option<Box<dyn Session>>>>,
}

impl SessionHandle {
    pub(crate) fn new(session: Box<dyn Session>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(session))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn Session>>> {
        // A panic while the lock was held leaves the session in an unknown
        // state, but the guard still needs it for rollback. Recover the
        // poisoned value rather than refusing to finalize.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` when both handles refer to the same session.
    pub fn ptr_eq(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `true` once the owning scope has finalized the session.
    pub fn is_finalized(&self) -> bool {
        self.lock().is_none()
    }

    /// Runs `f` with exclusive access to the live session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the owning scope already
    /// finalized the session.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut dyn Session) -> R) -> Result<R, SessionError> {
        let mut guard = self.lock();
        let session = guard.as_mut().ok_or(SessionError::Closed)?;
        Ok(f(session.as_mut()))
    }

    /// Finalizes the session: runs the mode's operation, then closes.
    ///
    /// Takes the session out of the handle first, so finalization happens at
    /// most once no matter how many clones exist. The first failure wins;
    /// close runs even when commit or rollback failed.
    pub(crate) fn finalize(&self, mode: FinalizeMode) -> Result<(), SessionError> {
        let Some(mut session) = self.lock().take() else {
            return Ok(());
        };

        let op_result = match mode {
            FinalizeMode::Commit => session.commit(),
            FinalizeMode::Rollback => session.rollback(),
            FinalizeMode::CloseOnly => Ok(()),
        };
        let close_result = session.close();

        match (op_result, close_result) {
            (Err(error), _) | (Ok(()), Err(error)) => Err(SessionError::Backend(error)),
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("finalized", &self.is_finalized())
            .finish()
    }
}
