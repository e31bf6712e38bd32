//! Counting provider/session doubles for lifecycle tests.
//!
//! [`CountingProvider`] records how many sessions were created and what each
//! scope asked for; its sessions record commit/rollback/close calls into a
//! shared [`Counters`]. Failure injection flags simulate backend errors on
//! the finalization paths. No database is involved.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::BackendError;
use crate::options::OptionMap;
use crate::provider::{Session, SessionProvider};

/// Shared call counters for one provider and all of its sessions.
#[derive(Debug, Default)]
pub struct Counters {
    /// Sessions created.
    pub created: AtomicUsize,
    /// Commit calls across all sessions.
    pub commits: AtomicUsize,
    /// Rollback calls across all sessions.
    pub rollbacks: AtomicUsize,
    /// Close calls across all sessions.
    pub closes: AtomicUsize,
    /// When set, commit calls fail.
    pub fail_commit: AtomicBool,
    /// When set, rollback calls fail.
    pub fail_rollback: AtomicBool,
    /// The option map each created session was given, in creation order.
    pub options_seen: Mutex<Vec<OptionMap>>,
}

impl Counters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Error injected by the failure flags.
#[derive(Debug, thiserror::Error)]
#[error("injected {operation} failure")]
pub struct InjectedFailure {
    /// Which operation was failed.
    pub operation: &'static str,
}

/// A [`SessionProvider`] that manufactures counting sessions.
#[derive(Debug, Default)]
pub struct CountingProvider {
    counters: Arc<Counters>,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The counters shared with every session this provider creates.
    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }
}

impl SessionProvider for CountingProvider {
    fn new_session(&self, options: &OptionMap) -> Result<Box<dyn Session>, BackendError> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        self.counters
            .options_seen
            .lock()
            .expect("options_seen lock")
            .push(options.clone());
        Ok(Box::new(CountingSession {
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct CountingSession {
    counters: Arc<Counters>,
}

impl Session for CountingSession {
    fn commit(&mut self) -> Result<(), BackendError> {
        if self.counters.fail_commit.load(Ordering::SeqCst) {
            return Err(Box::new(InjectedFailure {
                operation: "commit",
            }));
        }
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), BackendError> {
        if self.counters.fail_rollback.load(Ordering::SeqCst) {
            return Err(Box::new(InjectedFailure {
                operation: "rollback",
            }));
        }
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
