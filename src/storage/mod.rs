//! Durable session storage
//!
//! - `KeyValueStore`: string key/value backend (`MemoryStore`, `FileStore`)
//! - `SessionStore`: the two session keys on top of any backend
//!
//! Layout, compatible with the web console's local storage:
//! - `auth`: JSON `{"token": "...", "user": {"id", "email", "role": {"name"}}}`
//! - `auth_token`: the raw token again, for checks that skip parsing

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::auth::{AccessToken, Identity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Key holding the full serialized session
pub const AUTH_KEY: &str = "auth";

/// Key holding the redundant raw token
pub const TOKEN_KEY: &str = "auth_token";

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(String),

    #[error("corrupt entry '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Synchronous string key/value storage
pub trait KeyValueStore: Send + Sync {
    /// Read a key
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a key, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove all of the given keys in one step
    ///
    /// No read from this process may observe some of the keys removed and
    /// others still present.
    fn remove(&self, keys: &[&str]) -> Result<(), StorageError>;
}

/// The durable form of a signed-in session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub token: AccessToken,
    pub user: Identity,
}

/// Persisted session store over a key/value backend
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// A store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Read the full record
    ///
    /// `Ok(None)` when nothing is stored; `Err(StorageError::Corrupt)` when
    /// the entry exists but does not parse into a valid record.
    pub fn read_full(&self) -> Result<Option<PersistedRecord>, StorageError> {
        let raw = match self.backend.get(AUTH_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                key: AUTH_KEY.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn write_full(&self, record: &PersistedRecord) -> Result<(), StorageError> {
        let raw = serde_json::to_string(record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.backend.set(AUTH_KEY, &raw)?;
        debug!(user_id = record.user.id(), "Persisted session record");
        Ok(())
    }

    /// Read the redundant token copy; blank values count as absent
    pub fn read_token(&self) -> Result<Option<AccessToken>, StorageError> {
        Ok(self.backend.get(TOKEN_KEY)?.and_then(AccessToken::new))
    }

    pub fn write_token(&self, token: &AccessToken) -> Result<(), StorageError> {
        self.backend.set(TOKEN_KEY, token.as_str())
    }

    /// Drop the full record, leaving the token copy alone
    pub fn discard_full(&self) -> Result<(), StorageError> {
        self.backend.remove(&[AUTH_KEY])
    }

    /// Remove both keys together
    pub fn clear(&self) -> Result<(), StorageError> {
        self.backend.remove(&[AUTH_KEY, TOKEN_KEY])?;
        debug!("Cleared persisted session");
        Ok(())
    }
}
