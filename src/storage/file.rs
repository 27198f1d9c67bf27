//! File-backed key/value backend
//!
//! All keys live in one JSON object on disk. Every operation reads and
//! rewrites the whole file under a process-wide lock, and writes go through a
//! temporary file plus rename, so a multi-key `remove` is never observed half
//! done.

use crate::storage::{KeyValueStore, StorageError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

type Entries = BTreeMap<String, String>;

/// Key/value store persisted to a single JSON file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Use the file at `path`; it is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Entries, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(StorageError::Io(e.to_string())),
        };

        if raw.trim().is_empty() {
            return Ok(Entries::new());
        }

        serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
            key: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Load for modification; an unreadable file is replaced rather than kept.
    /// The flag is set when the file must be rewritten regardless of changes.
    fn load_for_write(&self) -> Result<(Entries, bool), StorageError> {
        match self.load() {
            Ok(entries) => Ok((entries, false)),
            Err(StorageError::Corrupt { reason, .. }) => {
                warn!(path = %self.path.display(), reason = %reason, "Replacing corrupt state file");
                Ok((Entries::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, entries: &Entries) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
            }
        }

        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw).map_err(|e| StorageError::Io(e.to_string()))?;
        restrict_permissions(&tmp)?;
        fs::rename(&tmp, &self.path).map_err(|e| StorageError::Io(e.to_string()))?;

        debug!(path = %self.path.display(), keys = entries.len(), "Wrote state file");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| StorageError::Io(e.to_string()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let (mut entries, _) = self.load_for_write()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let (mut entries, mut dirty) = self.load_for_write()?;
        for key in keys {
            dirty |= entries.remove(*key).is_some();
        }
        if !dirty {
            return Ok(());
        }
        self.save(&entries)
    }
}
