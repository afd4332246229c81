//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use toggle_engine::{Engine, EngineOptions, Host, HostSignal, Switch};
use toggle_store::{MemoryStore, StateStore, StoreError, StoreFut};
use toggle_types::{HostValue, SwitchConfig, SwitchName};

pub const BOUNCE: Duration = Duration::from_millis(250);
pub const RESTORE: Duration = Duration::from_millis(250);

pub fn name(s: &str) -> SwitchName {
    SwitchName::new(s).unwrap()
}

pub fn names(list: &[&str]) -> Vec<SwitchName> {
    list.iter().map(|s| name(s)).collect()
}

pub fn switch(s: &str) -> SwitchConfig {
    SwitchConfig::new(name(s))
}

/// Host that remembers every signal it was sent.
#[derive(Debug, Default)]
pub struct RecordingHost {
    signals: Mutex<Vec<HostSignal>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signals(&self) -> Vec<HostSignal> {
        self.signals.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.signals.lock().unwrap().clear();
    }

    pub fn updates(&self, switch: &str) -> Vec<HostValue> {
        self.signals()
            .into_iter()
            .filter_map(|s| match s {
                HostSignal::Update { name, value } if name.as_str() == switch => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn resyncs(&self, switch: &str) -> Vec<HostValue> {
        self.signals()
            .into_iter()
            .filter_map(|s| match s {
                HostSignal::Resync { name, value } if name.as_str() == switch => Some(value),
                _ => None,
            })
            .collect()
    }
}

impl Host for RecordingHost {
    fn signal(&self, signal: HostSignal) {
        self.signals.lock().unwrap().push(signal);
    }
}

/// Memory store with per-name failure injection and a write log.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: Mutex<HashSet<String>>,
    fail_reads: Mutex<HashSet<String>>,
    writes: Mutex<Vec<(String, bool)>>,
    /// Yield to the scheduler before every operation.
    yielding: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seeded(values: &[(&str, bool)]) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::with_values(values.iter().map(|(n, v)| (name(n), *v))),
            ..Self::default()
        })
    }

    /// Make every `get` and `set` a suspension point, so concurrent callers
    /// interleave at each store access.
    pub fn yield_on_access(&self) {
        self.yielding.store(true, Ordering::SeqCst);
    }

    async fn pause(&self) {
        if self.yielding.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    pub fn fail_writes_for(&self, switch: &str) {
        self.fail_writes.lock().unwrap().insert(switch.to_string());
    }

    pub fn fail_reads_for(&self, switch: &str) {
        self.fail_reads.lock().unwrap().insert(switch.to_string());
    }

    pub fn heal(&self) {
        self.fail_writes.lock().unwrap().clear();
        self.fail_reads.lock().unwrap().clear();
    }

    pub fn peek(&self, switch: &str) -> Option<bool> {
        self.inner.peek(switch)
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> Vec<(String, bool)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }
}

impl StateStore for FlakyStore {
    fn get<'a>(&'a self, name: &'a SwitchName) -> StoreFut<'a, Option<bool>> {
        Box::pin(async move {
            self.pause().await;
            if self.fail_reads.lock().unwrap().contains(name.as_str()) {
                return Err(StoreError::Unavailable(format!("read of {name} refused")));
            }
            self.inner.get(name).await
        })
    }

    fn set<'a>(&'a self, name: &'a SwitchName, value: bool) -> StoreFut<'a, ()> {
        Box::pin(async move {
            self.pause().await;
            if self.fail_writes.lock().unwrap().contains(name.as_str()) {
                return Err(StoreError::Unavailable(format!("write of {name} refused")));
            }
            self.inner.set(name, value).await?;
            self.writes
                .lock()
                .unwrap()
                .push((name.as_str().to_string(), value));
            Ok(())
        })
    }
}

pub fn options() -> EngineOptions {
    EngineOptions {
        bounce_delay: BOUNCE,
        restore_delay: RESTORE,
        ..EngineOptions::default()
    }
}

pub fn engine(store: &Arc<FlakyStore>) -> Engine {
    Engine::new(store.clone(), options())
}

/// Attach every config in order against one host.
pub async fn attach_all(
    engine: &Engine,
    host: &Arc<RecordingHost>,
    configs: Vec<SwitchConfig>,
) -> Vec<Switch> {
    let mut out = Vec::with_capacity(configs.len());
    for config in configs {
        out.push(engine.attach(config, host.clone()).await.unwrap());
    }
    out
}

/// Let every task that is ready to run make progress.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
