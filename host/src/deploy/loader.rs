//! Bundle loading service
//!
//! Platform-bundle consumers use this instead of the full viewing
//! pipeline: it resolves one executable bundle plus metadata per
//! deployment.

use std::sync::Arc;

use tracing::{debug, info};

use crate::deploy::classifier::Platform;
use crate::deploy::lister::StorageLister;
use crate::deploy::manifest::MetadataLoader;
use crate::deploy::materializer::Materializer;
use crate::errors::HostError;
use crate::http::client::HttpClient;
use crate::models::deployment::{AppDeployment, DeploymentId, FileEntry, PreparedApp};

pub struct BundleLoader {
    lister: Arc<StorageLister>,
    materializer: Arc<Materializer>,
    metadata: Arc<MetadataLoader>,
    http_client: Arc<HttpClient>,
    platform: Platform,
}

impl BundleLoader {
    pub fn new(
        lister: Arc<StorageLister>,
        materializer: Arc<Materializer>,
        metadata: Arc<MetadataLoader>,
        http_client: Arc<HttpClient>,
        platform: Platform,
    ) -> Self {
        Self {
            lister,
            materializer,
            metadata,
            http_client,
            platform,
        }
    }

    /// Listed files of a deployment; empty when listing fails
    pub async fn load_files(&self, deployment_id: &DeploymentId) -> Vec<FileEntry> {
        self.lister.list_deployment_files(deployment_id).await
    }

    /// Files and metadata of a deployment; `None` when either is missing
    pub async fn load_app_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> Option<AppDeployment> {
        let files = self.load_files(deployment_id).await;
        if files.is_empty() {
            return None;
        }
        let metadata = self.metadata.load_metadata(deployment_id, &files).await?;

        Some(AppDeployment {
            deployment_id: deployment_id.clone(),
            app_id: deployment_id.to_string(),
            metadata,
            files,
        })
    }

    /// Download the platform bundle and load metadata concurrently
    pub async fn prepare_app(
        &self,
        deployment_id: &DeploymentId,
        files: Option<Vec<FileEntry>>,
    ) -> Result<PreparedApp, HostError> {
        let files = match files {
            Some(files) => files,
            None => self.lister.try_list_deployment_files(deployment_id).await?,
        };

        let (bundle_path, metadata) = tokio::join!(
            self.materializer
                .download_platform_bundle(deployment_id, &files, self.platform),
            self.metadata.load_metadata(deployment_id, &files),
        );

        let bundle_path = bundle_path?;
        let metadata = metadata.ok_or_else(|| {
            HostError::NotFound(format!("metadata of deployment {}", deployment_id))
        })?;

        info!(
            "Prepared deployment {} ({} {})",
            deployment_id, metadata.name, metadata.version
        );
        Ok(PreparedApp {
            bundle_path,
            metadata,
        })
    }

    /// Text content of one deployment file, matched by relative path, leaf
    /// name, or path suffix
    pub async fn get_file_content(
        &self,
        deployment_id: &DeploymentId,
        path: &str,
    ) -> Result<String, HostError> {
        let files = self.lister.try_list_deployment_files(deployment_id).await?;
        let entry = find_file(&files, path).ok_or_else(|| {
            HostError::NotFound(format!("{} in deployment {}", path, deployment_id))
        })?;

        debug!("Fetching {} of deployment {}", entry.original_path, deployment_id);
        self.http_client.fetch_text(&entry.public_url).await
    }

    pub fn cached_bundles(&self) -> Vec<DeploymentId> {
        self.materializer.cached_bundles()
    }

    pub async fn clear_cache(&self) -> Result<(), HostError> {
        self.materializer.clear_cache().await
    }
}

/// First file whose relative path or leaf name is `path`, or whose
/// relative path ends with it
pub fn find_file<'a>(files: &'a [FileEntry], path: &str) -> Option<&'a FileEntry> {
    let path = path.trim_start_matches('/');
    files
        .iter()
        .find(|f| f.original_path == path || f.file_name == path || f.original_path.ends_with(path))
}
