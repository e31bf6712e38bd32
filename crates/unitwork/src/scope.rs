//! The scope manager: acquisition and release of the ambient session.
//!
//! A scope is entered by wrapping a future. The outermost entry on a task
//! becomes the *owning* scope: it installs the ambient binding, and on exit
//! it alone finalizes whatever session was lazily created inside. Nested
//! entries are transparent reuse: they alias the owner's slot, contribute
//! no finalization, and cannot replace an existing handle.
//!
//! Finalization is guaranteed on every exit path. The normal path commits or
//! rolls back according to the work future's `Result` and the commit policy;
//! a drop guard covers panic, early drop, and task abort by rolling back
//! whatever is left in the slot.

use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::ambient::{self, lock_slot, ScopeBinding, SlotCell};
use crate::error::{ConfigError, ScopeError, SessionError};
use crate::handle::{FinalizeMode, SessionHandle};
use crate::options::OptionMap;
use crate::provider::SessionProvider;

/// Returns the session handle for the active scope, creating the session on
/// first access.
///
/// Repeated calls within one scope return the same handle. Session creation
/// may block briefly (e.g. waiting for a pooled connection); call this from
/// the async task itself and move the returned handle into `spawn_blocking`
/// for query work.
///
/// # Errors
///
/// - [`SessionError::NotInitialised`] if no manager was ever constructed in
///   this process; the pipeline layer (or a manual manager) is missing.
/// - [`SessionError::MissingSession`] if a manager exists but the call site
///   is outside any open scope.
/// - [`SessionError::Backend`] if the provider fails to create a session.
pub fn current_session() -> Result<SessionHandle, SessionError> {
    let Some(binding) = ambient::try_current_binding() else {
        if ambient::manager_installed() {
            return Err(SessionError::MissingSession);
        }
        return Err(SessionError::NotInitialised);
    };

    let mut slot = lock_slot(&binding.cell);
    if let Some(handle) = slot.as_ref() {
        return Ok(handle.clone());
    }

    let session = binding
        .provider
        .new_session(&binding.options)
        .map_err(SessionError::Backend)?;
    let handle = SessionHandle::new(session);
    *slot = Some(handle.clone());
    tracing::trace!("session created lazily on first access");
    Ok(handle)
}

/// Per-entry overrides for a manual scope.
#[derive(Debug, Clone, Default)]
pub struct ScopeOptions {
    /// Session options merged over the manager defaults (override wins per
    /// key) when *this* scope triggers session creation. Ignored if a
    /// session already exists in an outer scope.
    pub session_options: Option<OptionMap>,
    /// Overrides the manager's commit-on-exit policy for this scope. Only
    /// meaningful on an owning scope; nested scopes never finalize.
    pub commit_on_exit: Option<bool>,
}

impl ScopeOptions {
    /// Overrides with the given session options.
    pub fn with_session_options(options: OptionMap) -> Self {
        Self {
            session_options: Some(options),
            ..Self::default()
        }
    }

    /// Overrides the commit-on-exit policy.
    pub fn with_commit_on_exit(commit: bool) -> Self {
        Self {
            commit_on_exit: Some(commit),
            ..Self::default()
        }
    }
}

/// Manages session scopes for one provider.
///
/// Cheap to clone; clones share the provider. Construct via
/// [`SessionManager::builder`] or from a deserialized
/// [`SessionConfig`](crate::SessionConfig).
#[derive(Clone)]
pub struct SessionManager {
    provider: Arc<dyn SessionProvider>,
    default_session_options: OptionMap,
    commit_on_exit: bool,
}

impl SessionManager {
    /// Starts building a manager. Commit-on-exit defaults to `true`.
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::new()
    }

    /// The manager-level commit-on-exit policy.
    pub fn commit_on_exit(&self) -> bool {
        self.commit_on_exit
    }

    /// The session options applied when no per-scope override is given.
    pub fn default_session_options(&self) -> &OptionMap {
        &self.default_session_options
    }

    /// Runs `work` inside a session scope with the manager's defaults.
    ///
    /// See [`scope_with`](Self::scope_with).
    pub async fn scope<F, T, E>(&self, work: F) -> Result<T, ScopeError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.scope_with(ScopeOptions::default(), work).await
    }

    /// Runs `work` inside a session scope.
    ///
    /// If no scope is open on this task, this entry becomes the owning
    /// scope: any session created inside is finalized here, exactly once.
    /// Commit on `Ok` (when commit-on-exit is enabled), rollback on `Err`,
    /// rollback on panic or task abort. If the scope never touched the
    /// session, nothing is created and nothing is finalized.
    ///
    /// If a scope is already open, this entry is a transparent nested
    /// participant: it shares the outer slot, its `commit_on_exit` override
    /// has no effect, and its session options only apply if the nested
    /// scope is the one that first touches the session.
    ///
    /// # Errors
    ///
    /// - [`ScopeError::Task`]: `work` failed; rollback succeeded.
    /// - [`ScopeError::Finalize`]: `work` succeeded; commit or close failed.
    /// - [`ScopeError::RollbackFailed`]: `work` failed and so did rollback;
    ///   the original error is attached.
    pub async fn scope_with<F, T, E>(&self, options: ScopeOptions, work: F) -> Result<T, ScopeError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if let Some(outer) = ambient::try_current_binding() {
            return self.nested_scope(outer, options, work).await;
        }

        let session_options = match options.session_options {
            Some(overrides) => self.default_session_options.merged_with(&overrides),
            None => self.default_session_options.clone(),
        };
        let commit_on_exit = options.commit_on_exit.unwrap_or(self.commit_on_exit);

        let cell: SlotCell = Arc::new(Mutex::new(None));
        let binding = ScopeBinding {
            provider: Arc::clone(&self.provider),
            options: session_options,
            cell: Arc::clone(&cell),
        };

        // Owner marker: rolls back whatever is in the slot if this future
        // is dropped before the normal exit path below runs.
        let mut owner = ScopeGuard::new(Arc::clone(&cell));
        let outcome = ambient::bind(binding, work).await;
        owner.disarm();

        let handle = lock_slot(&cell).take();
        let Some(handle) = handle else {
            // The scope stayed bound-empty: no session, nothing to finalize.
            return outcome.map_err(ScopeError::Task);
        };

        match outcome {
            Ok(value) => {
                let mode = if commit_on_exit {
                    FinalizeMode::Commit
                } else {
                    FinalizeMode::CloseOnly
                };
                finalize_off_thread(handle, mode)
                    .await
                    .map_err(ScopeError::Finalize)?;
                Ok(value)
            }
            Err(task) => match finalize_off_thread(handle, FinalizeMode::Rollback).await {
                Ok(()) => Err(ScopeError::Task(task)),
                Err(rollback) => Err(ScopeError::RollbackFailed { rollback, task }),
            },
        }
    }

    /// Spawns `work` as a tokio task wrapped in its own independent scope.
    ///
    /// Spawned tasks never inherit the caller's ambient slot, so each gets
    /// its own session, committed or rolled back when the task finishes.
    /// Aborting the task rolls back like any other cancelled scope.
    pub fn spawn_scoped<F, T, E>(
        self: &Arc<Self>,
        work: F,
    ) -> tokio::task::JoinHandle<Result<T, ScopeError<E>>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.scope(work).await })
    }

    async fn nested_scope<F, T, E>(
        &self,
        outer: ScopeBinding,
        options: ScopeOptions,
        work: F,
    ) -> Result<T, ScopeError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if options.commit_on_exit.is_some() {
            tracing::debug!(
                "commit_on_exit override on a nested scope has no effect; \
                 the owning scope finalizes"
            );
        }

        let session_options = match options.session_options {
            Some(overrides) => {
                if lock_slot(&outer.cell).is_some() {
                    // Deliberately preserved behavior: the session already
                    // exists, so the override cannot apply. Flagged here
                    // instead of erroring.
                    tracing::debug!(
                        "session options override on a nested scope ignored; \
                         a session is already active"
                    );
                }
                self.default_session_options.merged_with(&overrides)
            }
            None => outer.options.clone(),
        };

        let binding = ScopeBinding {
            provider: Arc::clone(&outer.provider),
            options: session_options,
            cell: Arc::clone(&outer.cell),
        };

        // Non-owning participant: no guard, no finalization, shared slot.
        ambient::bind(binding, work).await.map_err(ScopeError::Task)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("commit_on_exit", &self.commit_on_exit)
            .field("default_session_options", &self.default_session_options)
            .finish_non_exhaustive()
    }
}

/// Finalizes off the async worker thread; commit and rollback may block.
async fn finalize_off_thread(handle: SessionHandle, mode: FinalizeMode) -> Result<(), SessionError> {
    match tokio::task::spawn_blocking(move || handle.finalize(mode)).await {
        Ok(result) => result,
        Err(join_error) => Err(SessionError::Backend(Box::new(join_error))),
    }
}

/// Marks the owning scope and guards its finalization obligation.
///
/// Exactly one guard exists per owning scope. If the scope's future is
/// dropped before the normal exit path disarms it (panic unwinding, task
/// abort, early drop), the guard rolls the session back inline.
struct ScopeGuard {
    cell: SlotCell,
    armed: bool,
}

impl ScopeGuard {
    fn new(cell: SlotCell) -> Self {
        Self { cell, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let handle = lock_slot(&self.cell).take();
        if let Some(handle) = handle {
            match handle.finalize(FinalizeMode::Rollback) {
                Ok(()) => tracing::debug!("session rolled back on abnormal scope exit"),
                Err(error) => tracing::error!(
                    error = %error,
                    "failed to roll back session on abnormal scope exit"
                ),
            }
        }
    }
}

/// Builds a [`SessionManager`], validating the configuration surface.
#[derive(Default)]
pub struct SessionManagerBuilder {
    connection_target: Option<String>,
    provider: Option<Arc<dyn SessionProvider>>,
    provider_options: OptionMap,
    default_session_options: OptionMap,
    commit_on_exit: Option<bool>,
}

impl SessionManagerBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Connection descriptor handed to the connector (e.g. a database path
    /// or URL). Mutually exclusive with [`provider`](Self::provider).
    pub fn connection_target(mut self, target: impl Into<String>) -> Self {
        self.connection_target = Some(target.into());
        self
    }

    /// Uses an already-constructed provider instead of a connection target.
    pub fn provider(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Options passed to provider construction. Only consulted when a
    /// connection target is used.
    pub fn provider_options(mut self, options: OptionMap) -> Self {
        self.provider_options = options;
        self
    }

    /// Session options applied to every session unless a scope overrides
    /// them. Validated against the provider at build time.
    pub fn default_session_options(mut self, options: OptionMap) -> Self {
        self.default_session_options = options;
        self
    }

    /// Whether owning scopes commit on clean exit. Defaults to `true`.
    pub fn commit_on_exit(mut self, commit: bool) -> Self {
        self.commit_on_exit = Some(commit);
        self
    }

    /// Builds the manager, using `connect` to open the connection target if
    /// one was supplied.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingConnectionTarget`] if neither a target nor a
    ///   provider was supplied.
    /// - [`ConfigError::ConflictingProviders`] if both were supplied.
    /// - Any error from `connect` or from validating the default session
    ///   options against the provider.
    pub fn build_with<C>(self, connect: C) -> Result<SessionManager, ConfigError>
    where
        C: FnOnce(&str, &OptionMap) -> Result<Arc<dyn SessionProvider>, ConfigError>,
    {
        let provider = match (self.provider, self.connection_target) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingProviders),
            (Some(provider), None) => provider,
            (None, Some(target)) => connect(&target, &self.provider_options)?,
            (None, None) => return Err(ConfigError::MissingConnectionTarget),
        };

        provider.validate_session_options(&self.default_session_options)?;

        ambient::mark_installed();
        Ok(SessionManager {
            provider,
            default_session_options: self.default_session_options,
            commit_on_exit: self.commit_on_exit.unwrap_or(true),
        })
    }

    /// Builds the manager from a prebuilt provider.
    ///
    /// # Errors
    ///
    /// As [`build_with`](Self::build_with), plus
    /// [`ConfigError::ConnectorRequired`] if a connection target was
    /// supplied; targets need a connector to open them.
    pub fn build(self) -> Result<SessionManager, ConfigError> {
        self.build_with(|_, _| Err(ConfigError::ConnectorRequired))
    }
}
