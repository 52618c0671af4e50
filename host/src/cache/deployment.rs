//! Deployment-keyed cache

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::models::deployment::DeploymentId;

/// Cache entry with its insertion sequence number
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_seq: u64,
}

/// In-memory cache keyed by deployment id, evicting the oldest entry when
/// full
pub struct DeploymentCache<V> {
    entries: RwLock<HashMap<DeploymentId, CacheEntry<V>>>,
    capacity: u64,
    seq: AtomicU64,
}

impl<V: Clone> DeploymentCache<V> {
    /// Create a new cache holding at most `capacity` entries
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            seq: AtomicU64::new(0),
        }
    }

    /// Get a value from cache
    pub fn get(&self, deployment_id: &DeploymentId) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(deployment_id).map(|e| e.value.clone())
    }

    /// Insert or replace a value
    pub fn put(&self, deployment_id: DeploymentId, value: V) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        if !entries.contains_key(&deployment_id) && entries.len() as u64 >= self.capacity {
            if let Some(oldest_id) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_seq)
                .map(|(id, _)| id.clone())
            {
                entries.remove(&oldest_id);
            }
        }

        let entry = CacheEntry {
            value,
            inserted_seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        entries.insert(deployment_id, entry);
    }

    /// Remove one entry
    pub fn invalidate(&self, deployment_id: &DeploymentId) -> Option<V> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(deployment_id).map(|e| e.value)
    }

    /// Clear the cache
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Cached deployment ids
    pub fn keys(&self) -> Vec<DeploymentId> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.keys().cloned().collect()
    }

    /// Get cache size
    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
