//! In-memory caches keyed by deployment id

pub mod deployment;

use std::path::PathBuf;
use std::sync::Arc;

use crate::models::deployment::DeploymentManifest;

pub use deployment::DeploymentCache;

/// Resolved platform bundle paths
pub type BundleCache = DeploymentCache<PathBuf>;

/// Parsed deployment manifests
pub type MetadataCache = DeploymentCache<DeploymentManifest>;

/// Cache capacity configuration
#[derive(Debug, Clone, Copy)]
pub struct CacheCapacities {
    pub bundles: u64,
    pub metadata: u64,
}

impl Default for CacheCapacities {
    fn default() -> Self {
        Self {
            bundles: 100,
            metadata: 100,
        }
    }
}

/// Caches owned by the orchestrator and injected into its collaborators
#[derive(Clone)]
pub struct Caches {
    pub bundles: Arc<BundleCache>,
    pub metadata: Arc<MetadataCache>,
}

impl Caches {
    pub fn new(capacities: CacheCapacities) -> Self {
        Self {
            bundles: Arc::new(DeploymentCache::new(capacities.bundles)),
            metadata: Arc::new(DeploymentCache::new(capacities.metadata)),
        }
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        self.bundles.clear();
        self.metadata.clear();
    }
}

impl Default for Caches {
    fn default() -> Self {
        Self::new(CacheCapacities::default())
    }
}
