// Cancellation Context
// Host-owned stop hooks, registered for the length of a cascade run

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{info, warn};

type Hook = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`CancellationContext::register_cancellation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CancellationId(u64);

/// Explicit replacement for process-wide shutdown hooks.
///
/// The host creates one context, hands it to every cascade it runs and
/// calls [`CancellationContext::cancel`] when it is asked to exit. Each
/// cascade registers a hook when its run starts and removes it when the run
/// ends. Clones share state.
#[derive(Clone, Default)]
pub struct CancellationContext {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    hooks: Mutex<HashMap<CancellationId, Hook>>,
    notify: Notify,
}

impl std::fmt::Debug for CancellationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationContext")
            .field("cancelled", &self.is_cancelled())
            .field("registered", &self.registered_count())
            .finish()
    }
}

impl CancellationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook run on cancellation; runs at once if already cancelled
    pub fn register_cancellation<F>(&self, hook: F) -> CancellationId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = CancellationId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let hook: Hook = Arc::new(hook);

        self.hooks().insert(id, Arc::clone(&hook));
        if self.is_cancelled() {
            hook();
        }
        id
    }

    /// Remove a hook; false if it was not registered
    pub fn deregister_cancellation(&self, id: CancellationId) -> bool {
        self.hooks().remove(&id).is_some()
    }

    pub fn registered_count(&self) -> usize {
        self.hooks().len()
    }

    /// Run every registered hook once and wake waiters.
    ///
    /// Later calls are no-ops.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        let hooks: Vec<Hook> = self.hooks().values().cloned().collect();
        info!(hooks = hooks.len(), "Cancellation requested");
        for hook in hooks {
            hook();
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`CancellationContext::cancel`] has been called
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Cancel when the process receives Ctrl+C
    pub fn listen_for_ctrl_c(&self) {
        let context = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, stopping");
                    context.cancel();
                }
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        });
    }

    fn hooks(&self) -> std::sync::MutexGuard<'_, HashMap<CancellationId, Hook>> {
        self.inner
            .hooks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
