//! Atomic record write helpers.
//!
//! Records are written to a temp file in the store directory and renamed over
//! the target. On Windows, rename-over-existing fails, so we fall back to a
//! backup-and-restore dance and recover a stray `.bak` on the next open.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

/// File sync policy for a record before it is renamed into place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileSyncPolicy {
    #[default]
    SyncAll,
    SkipSync,
}

/// Directory sync policy after a record has been renamed into place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentDirSyncPolicy {
    SyncBestEffort,
    #[default]
    SkipSync,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicWriteOptions {
    pub file_sync: FileSyncPolicy,
    pub parent_dir_sync: ParentDirSyncPolicy,
}

impl AtomicWriteOptions {
    /// No fsync at all. Only for tests and throwaway stores.
    #[must_use]
    pub fn relaxed() -> Self {
        Self {
            file_sync: FileSyncPolicy::SkipSync,
            parent_dir_sync: ParentDirSyncPolicy::SkipSync,
        }
    }
}

/// Restore `path` from `path.bak` if a previous write died mid-swap.
///
/// Returns true when a backup was moved back into place.
pub fn recover_bak_file(path: &Path) -> bool {
    let backup = path.with_extension("bak");
    if path.exists() || !backup.exists() {
        return false;
    }
    match fs::rename(&backup, path) {
        Ok(()) => {
            tracing::warn!(
                path = %path.display(),
                "Recovered .bak record from interrupted write"
            );
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to recover .bak record: {e}");
            false
        }
    }
}

pub fn atomic_write(path: &Path, bytes: &[u8], options: AtomicWriteOptions) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    if matches!(options.file_sync, FileSyncPolicy::SyncAll) {
        tmp.as_file().sync_all()?;
    }

    if let Err(err) = tmp.persist(path) {
        if !path.exists() {
            return Err(err.error);
        }
        let backup_path = path.with_extension("bak");
        let _ = fs::remove_file(&backup_path);
        fs::rename(path, &backup_path)?;

        if let Err(rename_err) = err.file.persist(path) {
            let _ = fs::rename(&backup_path, path);
            return Err(rename_err.error);
        }
        if let Err(e) = fs::remove_file(&backup_path) {
            tracing::warn!(
                path = %backup_path.display(),
                "Failed to remove .bak after record write: {e}"
            );
        }
    }

    if matches!(options.parent_dir_sync, ParentDirSyncPolicy::SyncBestEffort)
        && let Err(e) = File::open(parent).and_then(|d| d.sync_all())
    {
        debug!(path = %parent.display(), "Store directory sync failed (best-effort): {e}");
    }

    Ok(())
}
