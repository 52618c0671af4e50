//! Persistent key-value store
//!
//! A flat string-to-string store shared by every mini-app. Callers are
//! responsible for partitioning keys; see `bridge::storage`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::HostError;
use crate::filesys::file::File;

/// Minimal async key-value interface
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, HostError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), HostError>;

    async fn remove(&self, key: &str) -> Result<(), HostError>;

    /// Every key currently stored
    async fn keys(&self) -> Result<Vec<String>, HostError>;

    /// Remove several keys in one write
    async fn multi_remove(&self, keys: &[String]) -> Result<(), HostError>;
}

/// In-memory store, lost on drop
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, HostError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), HostError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), HostError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, HostError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<(), HostError> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

/// JSON-file backed store.
///
/// The whole map is held in memory and rewritten atomically on each change.
pub struct FileKvStore {
    file: File,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileKvStore {
    /// Open the store, loading existing entries if the file exists
    pub async fn open(file: File) -> Result<Self, HostError> {
        let entries = if file.exists().await {
            file.read_json::<BTreeMap<String, String>>().await?
        } else {
            BTreeMap::new()
        };
        debug!(
            "Opened key-value store {} ({} keys)",
            file.path().display(),
            entries.len()
        );

        Ok(Self {
            file,
            entries: RwLock::new(entries),
        })
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), HostError> {
        self.file.write_json(entries).await
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, HostError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), HostError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), HostError> {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, HostError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<(), HostError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        for key in keys {
            entries.remove(key);
        }
        if entries.len() != before {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}
