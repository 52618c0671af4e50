//! Namespaced mini-app storage
//!
//! Every mini-app shares the host's key-value store. Keys are prefixed so
//! they never collide with host keys, and clearing only ever touches the
//! prefixed subset.

use std::sync::Arc;

use crate::errors::HostError;
use crate::storage::kv::KeyValueStore;

/// Prefix applied to every mini-app key
pub const KEY_PREFIX: &str = "@miniapp_localStorage:";

#[derive(Clone)]
pub struct NamespacedStorage {
    store: Arc<dyn KeyValueStore>,
}

impl NamespacedStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn namespaced(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }

    pub async fn get_item(&self, key: &str) -> Result<Option<String>, HostError> {
        self.store.get(&Self::namespaced(key)).await
    }

    pub async fn set_item(&self, key: &str, value: &str) -> Result<(), HostError> {
        self.store.set(&Self::namespaced(key), value).await
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), HostError> {
        self.store.remove(&Self::namespaced(key)).await
    }

    /// Remove every namespaced key; returns how many were removed
    pub async fn clear(&self) -> Result<usize, HostError> {
        let keys: Vec<String> = self
            .store
            .keys()
            .await?
            .into_iter()
            .filter(|key| key.starts_with(KEY_PREFIX))
            .collect();
        self.store.multi_remove(&keys).await?;
        Ok(keys.len())
    }
}
