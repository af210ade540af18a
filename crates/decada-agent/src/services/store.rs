// ============================================
// File: crates/decada-agent/src/services/store.rs
// ============================================
//! # Persistent Store
//!
//! ## Creation Reason
//! Keeps the issued client certificate and its serial number across
//! restarts for inspection. Nothing in the boot path depends on a value
//! being present.
//!
//! ## Main Functionality
//! - `PersistStore`: `get` / `set` of byte values by key
//! - `FileStore`: One JSON document on disk, values hex-encoded
//! - `MemoryStore`: Process-local map
//!
//! ## ⚠️ Important Note for Next Developer
//! - Private keys are never written here
//! - `FileStore::set` rewrites the whole file through a temporary file
//!   and a rename
//!
//! ## Last Modified
//! v0.1.0 - Initial store

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{AgentError, Result};

/// Key of the issued client certificate (PEM).
pub const KEY_CLIENT_CERT: &str = "client_cert";

/// Key of the issued certificate serial number.
pub const KEY_CLIENT_CERT_SN: &str = "client_cert_sn";

/// Key-value persistence.
#[async_trait]
pub trait PersistStore: Send + Sync {
    /// Reads `key`.
    ///
    /// # Errors
    /// Returns `Store` if the backing medium cannot be read.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes `key`.
    ///
    /// # Errors
    /// Returns `Store` if the backing medium cannot be written.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

// ============================================
// FileStore
// ============================================

/// JSON file store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Opens a store at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| AgentError::store(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(AgentError::store(format!("{}: {e}", self.path.display()))),
        }
    }
}

#[async_trait]
impl PersistStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let _guard = self.lock.lock().await;
        let entries = self.read_all().await?;
        entries
            .get(key)
            .map(|value| {
                hex::decode(value).map_err(|e| AgentError::store(format!("corrupt value for '{key}': {e}")))
            })
            .transpose()
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), hex::encode(value));

        let content = serde_json::to_string_pretty(&entries)
            .map_err(|e| AgentError::store(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(key, bytes = value.len(), "Store value written");
        Ok(())
    }
}

// ============================================
// MemoryStore
// ============================================

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("store.json");

        let store = FileStore::new(&path);
        assert!(store.get(KEY_CLIENT_CERT).await.unwrap().is_none());
        store.set(KEY_CLIENT_CERT, b"-----BEGIN CERTIFICATE-----").await.unwrap();
        store.set(KEY_CLIENT_CERT_SN, b"42").await.unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get(KEY_CLIENT_CERT).await.unwrap().unwrap(),
            b"-----BEGIN CERTIFICATE-----"
        );
        assert_eq!(reopened.get(KEY_CLIENT_CERT_SN).await.unwrap().unwrap(), b"42");
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.get("k").await, Err(AgentError::Store { .. })));
    }

    #[tokio::test]
    async fn test_memory_store_overwrites() {
        let store = MemoryStore::new();
        store.set("k", b"one").await.unwrap();
        store.set("k", b"two").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap(), b"two");
    }
}
