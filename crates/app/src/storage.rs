//! Session storage adapter.
//!
//! The backend client persists its session through [`SessionStorage`], the
//! same `getItem`/`setItem`/`removeItem` contract the hosted SDKs expect. Keys
//! are chosen by the client (`sb-<project>-auth-token`), values are opaque.
//!
//! - [`PreferencesStore`] - JSON key-value file, the shell's preference store
//! - [`MemoryStorage`] - process-local map for tests and ephemeral sessions
//!
//! Adapters are pure pass-throughs: no retry, no encryption, no caching beyond
//! what the underlying store does.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the underlying file failed.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The preference file exists but is not a JSON string map.
    #[error("corrupt preference file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Asynchronous key-value persistence used by the backend client.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Value stored under `key`, if any.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing a missing key succeeds.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// PreferencesStore
// =============================================================================

/// File-backed preference store.
///
/// The whole map is read on every access and rewritten atomically (temporary
/// file + rename) on every mutation; a session is a handful of keys. A mutex
/// serialises read-modify-write cycles within the process.
pub struct PreferencesStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PreferencesStore {
    /// Create a store backed by `path`. The file and its parent directory are
    /// created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the preference file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(StorageError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let bytes = serde_json::to_vec_pretty(map).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl SessionStorage for PreferencesStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await?;
        debug!(found = map.contains_key(key), "Preference read");
        Ok(map.get(key).cloned())
    }

    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map).await?;
        debug!("Preference written");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(key).is_some() {
            self.write_map(&map).await?;
            debug!("Preference removed");
        }
        Ok(())
    }
}

// =============================================================================
// MemoryStorage
// =============================================================================

/// In-memory storage; sessions do not survive the process.
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_preferences_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferencesStore::new(dir.path().join("prefs.json"));
        assert_eq!(store.get_item("sb-x-auth-token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_preferences_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferencesStore::new(dir.path().join("nested/prefs.json"));

        store.set_item("sb-x-auth-token", "{\"a\":1}").await.unwrap();
        store.set_item("other", "v").await.unwrap();
        assert_eq!(
            store.get_item("sb-x-auth-token").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );

        store.remove_item("sb-x-auth-token").await.unwrap();
        assert_eq!(store.get_item("sb-x-auth-token").await.unwrap(), None);
        assert_eq!(store.get_item("other").await.unwrap().as_deref(), Some("v"));

        // Removing twice is fine
        store.remove_item("sb-x-auth-token").await.unwrap();
    }

    #[tokio::test]
    async fn test_preferences_survive_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        PreferencesStore::new(&path)
            .set_item("k", "persisted")
            .await
            .unwrap();

        let reopened = PreferencesStore::new(&path);
        assert_eq!(
            reopened.get_item("k").await.unwrap().as_deref(),
            Some("persisted")
        );
    }

    #[tokio::test]
    async fn test_preferences_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let store = PreferencesStore::new(&path);
        let err = store.get_item("k").await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let store = MemoryStorage::new();
        assert!(store.is_empty().await);
        store.set_item("k", "v").await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get_item("k").await.unwrap().as_deref(), Some("v"));
        store.remove_item("k").await.unwrap();
        assert!(store.is_empty().await);
    }
}
