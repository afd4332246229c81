//! Delayed host resyncs, cancellable per switch.
//!
//! At most one action is pending per switch name. Scheduling a new one aborts
//! the previous one, and a real transition cancels whatever is pending, so a
//! late bounce or restore can never clobber a newer state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;
use toggle_types::SwitchName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncKind {
    /// Push a stale re-assertion back to rest.
    Bounce,
    /// Push a persisted state into a freshly built switch.
    Restore,
}

struct Pending {
    id: u64,
    kind: ResyncKind,
    abort: AbortHandle,
}

#[derive(Default)]
pub struct ResyncScheduler {
    pending: Mutex<HashMap<SwitchName, Pending>>,
    next_id: AtomicU64,
}

impl ResyncScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay` unless cancelled or replaced first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(
        self: &Arc<Self>,
        name: SwitchName,
        kind: ResyncKind,
        delay: Duration,
        action: F,
    ) where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let scheduler = Arc::clone(self);
        let key = name.clone();

        // The map lock is held across the spawn so the task cannot observe the
        // map before its own entry is in it.
        let mut pending = self.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if scheduler.finish(&key, id) {
                action();
            }
        });
        let replaced = pending.insert(
            name,
            Pending {
                id,
                kind,
                abort: handle.abort_handle(),
            },
        );
        drop(pending);

        if let Some(old) = replaced {
            old.abort.abort();
        }
    }

    /// Abort the pending action for `name`, returning what it was.
    pub fn cancel(&self, name: &SwitchName) -> Option<ResyncKind> {
        let old = self.lock().remove(name)?;
        old.abort.abort();
        Some(old.kind)
    }

    #[must_use]
    pub fn pending(&self, name: &SwitchName) -> Option<ResyncKind> {
        self.lock().get(name).map(|p| p.kind)
    }

    /// Abort everything. Used on shutdown.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Pending> = self.lock().drain().map(|(_, p)| p).collect();
        for p in &drained {
            p.abort.abort();
        }
        drained.len()
    }

    /// Claim the slot for a firing task. False if it was cancelled or replaced.
    fn finish(&self, name: &SwitchName, id: u64) -> bool {
        let mut pending = self.lock();
        match pending.get(name) {
            Some(p) if p.id == id => {
                pending.remove(name);
                true
            }
            _ => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SwitchName, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ResyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResyncScheduler")
            .field("pending", &self.lock().len())
            .finish_non_exhaustive()
    }
}
