//! Switch registry: every known switch and its static dependency lists.
//!
//! Entries are appended at attach time and never removed, so registration
//! order is stable and candidate lists come back in that order.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use thiserror::Error;
use toggle_types::{SwitchConfig, SwitchName};

use crate::switch::SwitchCore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("switch '{0}' is already registered")]
    Duplicate(SwitchName),
    #[error("switch '{name}' lists itself in {list}")]
    SelfDependency {
        name: SwitchName,
        list: &'static str,
    },
}

/// Reject configurations that can never be registered.
pub(crate) fn validate(config: &SwitchConfig) -> Result<(), RegistryError> {
    let self_ref = |list: &[SwitchName]| list.iter().any(|dep| dep == &config.name);
    if self_ref(&config.depends_on) {
        return Err(RegistryError::SelfDependency {
            name: config.name.clone(),
            list: "depends_on",
        });
    }
    if self_ref(&config.depends_off) {
        return Err(RegistryError::SelfDependency {
            name: config.name.clone(),
            list: "depends_off",
        });
    }
    Ok(())
}

#[derive(Default)]
pub struct Registry {
    entries: RwLock<Vec<Arc<SwitchCore>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, core: Arc<SwitchCore>) -> Result<(), RegistryError> {
        validate(core.config())?;
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|e| e.name() == core.name()) {
            return Err(RegistryError::Duplicate(core.name().clone()));
        }
        entries.push(core);
        Ok(())
    }

    /// Configs whose `depends_on` contains `name`, in registration order.
    #[must_use]
    pub fn dependents_on(&self, name: &str) -> Vec<SwitchConfig> {
        self.configs_listening(name, true)
    }

    /// Configs whose `depends_off` contains `name`, in registration order.
    #[must_use]
    pub fn dependents_off(&self, name: &str) -> Vec<SwitchConfig> {
        self.configs_listening(name, false)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<SwitchConfig> {
        self.read()
            .iter()
            .find(|e| e.name().as_str() == name)
            .map(|e| e.config().clone())
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<SwitchName> {
        self.read().iter().map(|e| e.name().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Switches to evaluate after `name` changed to `state`.
    pub(crate) fn candidates(&self, name: &str, state: bool) -> Vec<Arc<SwitchCore>> {
        self.read()
            .iter()
            .filter(|e| e.config().listens_to(name, state))
            .cloned()
            .collect()
    }

    pub(crate) fn core(&self, name: &str) -> Option<Arc<SwitchCore>> {
        self.read()
            .iter()
            .find(|e| e.name().as_str() == name)
            .cloned()
    }

    pub(crate) fn cores(&self) -> Vec<Arc<SwitchCore>> {
        self.read().clone()
    }

    fn configs_listening(&self, name: &str, state: bool) -> Vec<SwitchConfig> {
        self.candidates(name, state)
            .iter()
            .map(|e| e.config().clone())
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<SwitchCore>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}
