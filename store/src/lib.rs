//! Durable switch state for Toggle.
//!
//! The engine only needs a tiny key/value contract: the last boolean applied to
//! each switch, readable after a restart. [`StateStore`] is that contract.
//! [`FileStore`] keeps one record per switch on disk; [`MemoryStore`] keeps
//! everything in process.

pub mod atomic_write;
mod file;
mod memory;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use thiserror::Error;
use toggle_types::SwitchName;

pub use atomic_write::{AtomicWriteOptions, FileSyncPolicy, ParentDirSyncPolicy};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Store operation future type alias.
pub type StoreFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot open store directory {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write record {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot encode record for '{name}': {source}")]
    Encode {
        name: SwitchName,
        source: serde_json::Error,
    },
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// Backend-specific failure for stores that are not file based.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Key/value contract between the engine and persistence.
///
/// `set` must be durable when its future resolves, and a `get` issued after a
/// successful `set` on the same key must observe it.
pub trait StateStore: Send + Sync {
    /// Last persisted value, or `None` if the switch was never set.
    fn get<'a>(&'a self, name: &'a SwitchName) -> StoreFut<'a, Option<bool>>;

    fn set<'a>(&'a self, name: &'a SwitchName, value: bool) -> StoreFut<'a, ()>;
}
