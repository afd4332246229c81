//! Switch entity: one per configured switch.
//!
//! A [`Switch`] is a cheap handle (`Clone`) over shared state owned by the
//! registry. External set requests enter through [`Switch::request_state`] or
//! the callback-style [`Switch::set`]; cascaded updates from the propagation
//! engine skip the stale re-assertion check and go straight to the apply path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use toggle_store::StoreError;
use toggle_types::{Representation, SwitchConfig, SwitchName};

use crate::engine::Engine;
use crate::host::{Host, HostSignal};
use crate::propagation::{Cascade, PropagationError};
use crate::scheduler::ResyncKind;

/// What a set request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State persisted and propagated.
    Applied,
    /// ON while already ON: nothing persisted, a resync back to rest is queued.
    Bounced,
}

#[derive(Debug, Error)]
pub enum SwitchError {
    /// The switch kept its previous state.
    #[error("failed to persist state for '{name}': {source}")]
    Store {
        name: SwitchName,
        #[source]
        source: StoreError,
    },
    /// The switch itself was applied, but its cascade was aborted.
    #[error(transparent)]
    Propagation(#[from] PropagationError),
}

/// Registry-owned state for one switch.
pub(crate) struct SwitchCore {
    config: SwitchConfig,
    state: AtomicBool,
    host: Arc<dyn Host>,
}

impl SwitchCore {
    pub(crate) fn new(config: SwitchConfig, host: Arc<dyn Host>) -> Self {
        Self {
            config,
            state: AtomicBool::new(false),
            host,
        }
    }

    pub(crate) fn name(&self) -> &SwitchName {
        &self.config.name
    }

    pub(crate) fn config(&self) -> &SwitchConfig {
        &self.config
    }

    pub(crate) fn verbose(&self) -> bool {
        self.config.debug
    }

    pub(crate) fn state(&self) -> bool {
        self.state.load(Ordering::Acquire)
    }

    pub(crate) fn set_state(&self, state: bool) {
        self.state.store(state, Ordering::Release);
    }

    /// Mirror an applied state on the host, without echo.
    pub(crate) fn reflect(&self, state: bool) {
        self.host.signal(HostSignal::Update {
            name: self.name().clone(),
            value: self.config.kind.reflect(state),
        });
    }

    /// Force the host representation back to rest; the host may echo it.
    pub(crate) fn release(&self) {
        self.host.signal(HostSignal::Resync {
            name: self.name().clone(),
            value: self.config.kind.released(),
        });
    }
}

#[derive(Clone)]
pub struct Switch {
    core: Arc<SwitchCore>,
    engine: Engine,
}

impl Switch {
    pub(crate) fn new(core: Arc<SwitchCore>, engine: Engine) -> Self {
        Self { core, engine }
    }

    #[must_use]
    pub fn name(&self) -> &SwitchName {
        self.core.name()
    }

    #[must_use]
    pub fn config(&self) -> &SwitchConfig {
        self.core.config()
    }

    /// Cached in-memory state. Never touches the store.
    #[must_use]
    pub fn current_state(&self) -> bool {
        self.core.state()
    }

    /// Host-facing description of this switch.
    #[must_use]
    pub fn representations(&self) -> Representation {
        Representation::new(
            self.name().clone(),
            self.config().kind,
            self.engine.options().accessory.clone(),
        )
    }

    /// Externally triggered request to change state.
    ///
    /// ON while already ON is a stale re-assertion: nothing is persisted or
    /// propagated, and a resync back to rest is scheduled instead. Anything
    /// else is a real transition.
    pub async fn request_state(&self, turn_on: bool) -> Result<Transition, SwitchError> {
        let inner = self.engine.inner();
        let _serial = inner.cascade_lock.lock().await;
        let core = &self.core;

        diag!(
            core.verbose(),
            switch = %core.name(),
            requested = turn_on,
            previous = core.state(),
            "Set request"
        );

        if turn_on && core.state() {
            diag!(
                core.verbose(),
                switch = %core.name(),
                "Switch is already on, bouncing back to off"
            );
            let bounced = Arc::clone(core);
            inner.scheduler.schedule(
                core.name().clone(),
                ResyncKind::Bounce,
                inner.options.bounce_delay,
                move || bounced.release(),
            );
            return Ok(Transition::Bounced);
        }

        let mut cascade = Cascade::new(inner.options.max_depth);
        match inner.apply(core, turn_on, &mut cascade).await {
            Ok(()) => Ok(Transition::Applied),
            Err(e) => {
                match &e {
                    SwitchError::Store { .. } => {
                        tracing::error!(switch = %core.name(), "Set request failed: {e}");
                    }
                    SwitchError::Propagation(_) => {
                        tracing::error!(switch = %core.name(), "Cascade aborted: {e}");
                    }
                }
                Err(e)
            }
        }
    }

    /// Host event interface: handle a set request, then acknowledge it.
    ///
    /// `done` runs exactly once, after the request is fully processed,
    /// whatever the outcome.
    pub async fn set<F>(&self, target: bool, done: F)
    where
        F: FnOnce(Result<Transition, SwitchError>) + Send,
    {
        let result = self.request_state(target).await;
        done(result);
    }

    /// Adopt a persisted ON state without propagating it.
    pub(crate) async fn restore(&self) {
        let inner = self.engine.inner();
        let core = &self.core;
        let _serial = inner.cascade_lock.lock().await;

        let stored = match inner.store.get(core.name()).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(switch = %core.name(), "Could not read persisted state: {e}");
                return;
            }
        };
        diag!(core.verbose(), switch = %core.name(), stored = ?stored, "Loaded persisted state");
        if stored != Some(true) {
            return;
        }

        core.set_state(true);
        let restored = Arc::clone(core);
        inner.scheduler.schedule(
            core.name().clone(),
            ResyncKind::Restore,
            inner.options.restore_delay,
            move || {
                tracing::info!(switch = %restored.name(), "Restoring persisted state: on");
                restored.reflect(true);
            },
        );
    }
}

impl std::fmt::Debug for Switch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Switch")
            .field("name", self.name())
            .field("state", &self.current_state())
            .finish_non_exhaustive()
    }
}
