//! Engine facade: owns the store handle, registry, scheduler, and cascade lock.
//!
//! Transitions are single-writer. Every external request takes the cascade
//! lock before its first store read and holds it until its whole cascade has
//! finished, so no cascade ever reads a dependency vector another cascade is
//! halfway through writing. Delayed resyncs run outside the lock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use toggle_config::ToggleConfig;
use toggle_store::StateStore;
use toggle_types::{AccessoryInfo, SwitchConfig, SwitchName};

use crate::host::Host;
use crate::propagation::{Cascade, PropagationError};
use crate::registry::{Registry, RegistryError};
use crate::scheduler::ResyncScheduler;
use crate::switch::{Switch, SwitchCore};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Delay before a stale re-assertion is bounced back to the host.
    pub bounce_delay: Duration,
    /// Delay before a restored state is pushed to the host.
    pub restore_delay: Duration,
    /// Longest chain of cascaded updates before the cascade is aborted.
    pub max_depth: usize,
    pub accessory: AccessoryInfo,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            bounce_delay: Duration::from_millis(250),
            restore_delay: Duration::from_millis(250),
            max_depth: 64,
            accessory: AccessoryInfo::default(),
        }
    }
}

impl From<&ToggleConfig> for EngineOptions {
    fn from(config: &ToggleConfig) -> Self {
        Self {
            bounce_delay: config.timing.bounce_delay(),
            restore_delay: config.timing.restore_delay(),
            max_depth: config.propagation.max_depth,
            accessory: config.accessory.clone(),
        }
    }
}

pub(crate) struct EngineInner {
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) registry: Registry,
    pub(crate) scheduler: Arc<ResyncScheduler>,
    pub(crate) cascade_lock: Mutex<()>,
    pub(crate) options: EngineOptions,
}

#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, options: EngineOptions) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                registry: Registry::new(),
                scheduler: Arc::new(ResyncScheduler::new()),
                cascade_lock: Mutex::new(()),
                options,
            }),
        }
    }

    pub(crate) fn inner(&self) -> &EngineInner {
        &self.inner
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    #[must_use]
    pub fn scheduler(&self) -> &ResyncScheduler {
        &self.inner.scheduler
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.inner.store
    }

    /// Build and register a switch, then restore its persisted state.
    ///
    /// Registration order is attach order. A persisted ON value is adopted
    /// immediately and pushed to the host after the restore delay; it never
    /// propagates.
    pub async fn attach(
        &self,
        config: SwitchConfig,
        host: Arc<dyn Host>,
    ) -> Result<Switch, RegistryError> {
        let core = Arc::new(SwitchCore::new(config, host));
        self.inner.registry.register(Arc::clone(&core))?;
        tracing::debug!(
            switch = %core.name(),
            depends_on = core.config().depends_on.len(),
            depends_off = core.config().depends_off.len(),
            "Registered switch"
        );

        let switch = Switch::new(core, self.clone());
        switch.restore().await;
        Ok(switch)
    }

    #[must_use]
    pub fn switch(&self, name: &str) -> Option<Switch> {
        self.inner
            .registry
            .core(name)
            .map(|core| Switch::new(core, self.clone()))
    }

    /// All switches in registration order.
    #[must_use]
    pub fn switches(&self) -> Vec<Switch> {
        self.inner
            .registry
            .cores()
            .into_iter()
            .map(|core| Switch::new(core, self.clone()))
            .collect()
    }

    /// Propagate `name` having changed to `state`, without touching `name` itself.
    pub async fn trigger(&self, name: &SwitchName, state: bool) -> Result<(), PropagationError> {
        let _serial = self.inner.cascade_lock.lock().await;
        let mut cascade = Cascade::new(self.inner.options.max_depth);
        cascade.enter(name, state)?;

        let verbose = self
            .inner
            .registry
            .core(name.as_str())
            .is_some_and(|core| core.verbose());
        let result = self
            .inner
            .propagate(name, verbose, state, &mut cascade)
            .await;
        if let Err(e) = &result {
            tracing::error!(switch = %name, "Cascade aborted: {e}");
        }
        result
    }

    /// Drop every pending delayed resync.
    pub fn shutdown(&self) {
        let cancelled = self.inner.scheduler.cancel_all();
        if cancelled > 0 {
            tracing::debug!(cancelled, "Cancelled pending resyncs on shutdown");
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.inner.options)
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}
