//! One-record-per-switch durable store.
//!
//! Each switch lives in its own file named by the hex SHA-256 of the switch
//! name, holding `{"key": <name>, "value": <bool>}`. The directory is scanned
//! once on open; after that reads are served from memory and writes go to
//! disk first, then to memory.
//!
//! Parsing is forgiving: a truncated, garbled, or misplaced record is logged
//! and treated as absent instead of failing the open.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use toggle_types::SwitchName;

use crate::atomic_write::{AtomicWriteOptions, atomic_write, recover_bak_file};
use crate::{StateStore, StoreError, StoreFut};

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    key: SwitchName,
    value: bool,
}

pub struct FileStore {
    dir: PathBuf,
    options: AtomicWriteOptions,
    cache: RwLock<HashMap<SwitchName, bool>>,
    /// Serializes disk writes so the cache never disagrees with the last file
    /// written for a key.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_options(dir, AtomicWriteOptions::default()).await
    }

    pub async fn open_with_options(
        dir: impl Into<PathBuf>,
        options: AtomicWriteOptions,
    ) -> Result<Self, StoreError> {
        let dir = dir.into();
        let scan_dir = dir.clone();
        let cache = tokio::task::spawn_blocking(move || load_records(&scan_dir)).await??;

        tracing::debug!(
            dir = %dir.display(),
            records = cache.len(),
            "State store opened"
        );

        Ok(Self {
            dir,
            options,
            cache: RwLock::new(cache),
            write_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file backing `name`.
    #[must_use]
    pub fn record_path(&self, name: &SwitchName) -> PathBuf {
        self.dir.join(record_file_name(name))
    }

    /// Number of switches with a persisted value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_cache().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SwitchName, bool>> {
        self.cache
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    async fn write_record(&self, name: &SwitchName, value: bool) -> Result<(), StoreError> {
        let record = Record {
            key: name.clone(),
            value,
        };
        let bytes = serde_json::to_vec(&record).map_err(|source| StoreError::Encode {
            name: name.clone(),
            source,
        })?;
        let path: Arc<Path> = self.record_path(name).into();
        let options = self.options;

        let _guard = self.write_lock.lock().await;
        let target = Arc::clone(&path);
        tokio::task::spawn_blocking(move || atomic_write(&target, &bytes, options))
            .await?
            .map_err(|source| StoreError::Write {
                path: path.to_path_buf(),
                source,
            })?;

        self.cache
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name.clone(), value);
        Ok(())
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("dir", &self.dir)
            .field("records", &self.len())
            .finish_non_exhaustive()
    }
}

impl StateStore for FileStore {
    fn get<'a>(&'a self, name: &'a SwitchName) -> StoreFut<'a, Option<bool>> {
        Box::pin(async move { Ok(self.read_cache().get(name).copied()) })
    }

    fn set<'a>(&'a self, name: &'a SwitchName, value: bool) -> StoreFut<'a, ()> {
        Box::pin(self.write_record(name, value))
    }
}

fn record_file_name(name: &SwitchName) -> String {
    let digest = Sha256::digest(name.as_str().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn load_records(dir: &Path) -> Result<HashMap<SwitchName, bool>, StoreError> {
    let open_err = |source| StoreError::Open {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(open_err)?;

    // Backups first, so an interrupted write is read back as the old value.
    for entry in std::fs::read_dir(dir).map_err(open_err)?.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "bak") {
            recover_bak_file(&path.with_extension(""));
        }
    }

    let mut records = HashMap::new();
    for entry in std::fs::read_dir(dir).map_err(open_err)?.flatten() {
        let path = entry.path();
        if !is_record_file(&path) {
            continue;
        }
        let Some(record) = read_record(&path) else {
            continue;
        };
        let expected = record_file_name(&record.key);
        if path.file_name().and_then(|n| n.to_str()) != Some(expected.as_str()) {
            tracing::warn!(
                path = %path.display(),
                key = %record.key,
                "Ignoring store record filed under the wrong name"
            );
            continue;
        }
        records.insert(record.key, record.value);
    }
    Ok(records)
}

/// Record files are bare 64-char hex names; temp files and backups are not.
fn is_record_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.len() == 64 && n.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn read_record(path: &Path) -> Option<Record> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Skipping unreadable store record: {e}");
            return None;
        }
    };
    match serde_json::from_slice::<Record>(&raw) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Skipping corrupt store record: {e}");
            None
        }
    }
}
