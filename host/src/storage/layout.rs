//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::models::deployment::DeploymentId;

/// Storage layout for the host
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Application-private root for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Root of materialized deployments
    pub fn mini_apps_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("mini-apps"))
    }

    /// Materialization directory of one deployment
    pub fn mini_app_dir(&self, deployment_id: &DeploymentId) -> Dir {
        self.mini_apps_dir().subdir(deployment_id.as_str())
    }

    /// Root of resolved platform bundles
    pub fn bundles_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("bundles"))
    }

    /// Bundle directory of one deployment
    pub fn bundle_dir(&self, deployment_id: &DeploymentId) -> Dir {
        self.bundles_dir().subdir(deployment_id.as_str())
    }

    /// Persistent key-value store backing the bridge storage
    pub fn kv_store_file(&self) -> File {
        File::new(self.base_dir.join("kv").join("store.json"))
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::HostError> {
        self.mini_apps_dir().create().await?;
        self.bundles_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let base_dir = std::env::var_os("MINIHOST_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .or_else(|| std::env::var_os("USERPROFILE"))
                    .map(|home| PathBuf::from(home).join(".minihost"))
            })
            .unwrap_or_else(|| PathBuf::from(".minihost"));

        Self::new(base_dir)
    }
}
