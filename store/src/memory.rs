use std::collections::HashMap;
use std::sync::Mutex;

use toggle_types::SwitchName;

use crate::{StateStore, StoreFut};

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<SwitchName, bool>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed values, as if a previous run had persisted them.
    #[must_use]
    pub fn with_values(values: impl IntoIterator<Item = (SwitchName, bool)>) -> Self {
        Self {
            data: Mutex::new(values.into_iter().collect()),
        }
    }

    /// Synchronous read for assertions and diagnostics.
    #[must_use]
    pub fn peek(&self, name: &str) -> Option<bool> {
        self.lock().get(name).copied()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SwitchName, bool>> {
        self.data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl StateStore for MemoryStore {
    fn get<'a>(&'a self, name: &'a SwitchName) -> StoreFut<'a, Option<bool>> {
        Box::pin(async move { Ok(self.peek(name.as_str())) })
    }

    fn set<'a>(&'a self, name: &'a SwitchName, value: bool) -> StoreFut<'a, ()> {
        Box::pin(async move {
            self.lock().insert(name.clone(), value);
            Ok(())
        })
    }
}
