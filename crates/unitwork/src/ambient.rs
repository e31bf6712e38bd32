//! Ambient, task-local storage for the active session scope.
//!
//! Each logical execution (request, spawned task, manual scope) that enters
//! a scope gets its own binding; concurrent executions never observe each
//! other's slot. The only process-wide state is a write-once flag recording
//! that *some* manager was constructed, used purely to distinguish "never
//! wired up" from "wired up, but called outside a scope".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::handle::SessionHandle;
use crate::options::OptionMap;
use crate::provider::SessionProvider;

/// The slot cell: empty until the first `current_session` call in the scope.
pub(crate) type SlotCell = Arc<Mutex<Option<SessionHandle>>>;

/// Values visible to everything running inside one open scope.
#[derive(Clone)]
pub(crate) struct ScopeBinding {
    /// The factory used for lazy session creation.
    pub(crate) provider: Arc<dyn SessionProvider>,
    /// Effective session options for creation triggered by this scope.
    pub(crate) options: OptionMap,
    /// Shared slot; nested scopes alias the owner's cell.
    pub(crate) cell: SlotCell,
}

tokio::task_local! {
    static ACTIVE_SCOPE: ScopeBinding;
}

/// Runs `work` with `binding` installed as the ambient scope.
pub(crate) async fn bind<F: std::future::Future>(binding: ScopeBinding, work: F) -> F::Output {
    ACTIVE_SCOPE.scope(binding, work).await
}

/// Returns the innermost binding, if this task is inside a scope.
pub(crate) fn try_current_binding() -> Option<ScopeBinding> {
    ACTIVE_SCOPE.try_with(ScopeBinding::clone).ok()
}

/// Locks a slot cell, recovering from poisoning so finalization always has
/// access to the handle.
pub(crate) fn lock_slot(cell: &SlotCell) -> MutexGuard<'_, Option<SessionHandle>> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

static MANAGER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Records that a manager exists in this process. Never unset.
pub(crate) fn mark_installed() {
    MANAGER_INSTALLED.store(true, Ordering::Relaxed);
}

/// Whether any manager was ever constructed in this process.
pub(crate) fn manager_installed() -> bool {
    MANAGER_INSTALLED.load(Ordering::Relaxed)
}
