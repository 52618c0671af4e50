//! Local materialization of deployments
//!
//! Writes a deployment's files (or a literal entry document) under
//! `mini-apps/{id}`, and resolves single platform bundles under
//! `bundles/{id}`.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::cache::Caches;
use crate::deploy::classifier::{platform_bundle, Platform};
use crate::errors::HostError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::http::client::HttpClient;
use crate::models::deployment::{DeploymentId, FileEntry};
use crate::storage::layout::StorageLayout;

/// Name of the document written for literal content
pub const ENTRY_DOCUMENT: &str = "index.html";

/// What to write into a deployment directory
#[derive(Debug, Clone, Copy)]
pub enum MaterializeSource<'a> {
    Files(&'a [FileEntry]),
    Literal(&'a str),
}

/// Outcome of a materialization
#[derive(Debug, Clone)]
pub struct MaterializeReport {
    pub root: Dir,
    pub written: usize,
    pub failed: Vec<String>,
}

impl MaterializeReport {
    pub fn attempted(&self) -> usize {
        self.written + self.failed.len()
    }
}

/// Downloads deployments onto local storage
pub struct Materializer {
    http_client: Arc<HttpClient>,
    layout: StorageLayout,
    caches: Caches,
}

impl Materializer {
    pub fn new(http_client: Arc<HttpClient>, layout: StorageLayout, caches: Caches) -> Self {
        Self {
            http_client,
            layout,
            caches,
        }
    }

    /// Local directory of a deployment
    pub fn root_for(&self, deployment_id: &DeploymentId) -> Dir {
        self.layout.mini_app_dir(deployment_id)
    }

    /// Write `source` into the deployment directory.
    ///
    /// Fails only when nothing could be written; individual download
    /// failures are logged and reported.
    pub async fn materialize(
        &self,
        deployment_id: &DeploymentId,
        source: MaterializeSource<'_>,
    ) -> Result<MaterializeReport, HostError> {
        if !deployment_id.is_valid() {
            return Err(HostError::Materialization(format!(
                "invalid deployment id {:?}",
                deployment_id.as_str()
            )));
        }

        let root = self.root_for(deployment_id);
        root.create().await.map_err(|e| {
            HostError::Materialization(format!(
                "cannot create {}: {}",
                root.path().display(),
                e
            ))
        })?;

        let files = match source {
            MaterializeSource::Literal(content) => {
                root.file(ENTRY_DOCUMENT)
                    .write_string(content)
                    .await
                    .map_err(|e| HostError::Materialization(e.to_string()))?;
                debug!("Wrote literal content for deployment {}", deployment_id);
                return Ok(MaterializeReport {
                    root,
                    written: 1,
                    failed: Vec::new(),
                });
            }
            MaterializeSource::Files(files) => files,
        };

        let results = join_all(files.iter().map(|entry| self.download_file(&root, entry))).await;

        let mut written = 0;
        let mut failed = Vec::new();
        for (entry, result) in files.iter().zip(results) {
            match result {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!("Failed to download {}: {}", entry.original_path, e);
                    failed.push(entry.original_path.clone());
                }
            }
        }

        if written == 0 {
            return Err(HostError::Materialization(format!(
                "no files materialized for deployment {} ({} attempted)",
                deployment_id,
                files.len()
            )));
        }

        info!(
            "Materialized {}/{} files for deployment {}",
            written,
            files.len(),
            deployment_id
        );
        Ok(MaterializeReport {
            root,
            written,
            failed,
        })
    }

    async fn download_file(&self, root: &Dir, entry: &FileEntry) -> Result<(), HostError> {
        let target = root.resolve_relative(&entry.original_path)?;
        let bytes = self.http_client.fetch_bytes(&entry.public_url).await?;
        target.write_atomic(&bytes).await
    }

    /// Download the bundle matching `platform` to `bundles/{id}/index.{ext}`.
    ///
    /// Cached per deployment; a cached path is reused only while the file
    /// is still on disk.
    pub async fn download_platform_bundle(
        &self,
        deployment_id: &DeploymentId,
        files: &[FileEntry],
        platform: Platform,
    ) -> Result<PathBuf, HostError> {
        if let Some(path) = self.caches.bundles.get(deployment_id) {
            if File::new(path.clone()).exists().await {
                debug!("Bundle cache hit for deployment {}", deployment_id);
                return Ok(path);
            }
            self.caches.bundles.invalidate(deployment_id);
        }

        let entry = platform_bundle(files, platform).ok_or_else(|| {
            HostError::BundleNotFound(format!(
                "no {} bundle in deployment {}",
                platform, deployment_id
            ))
        })?;

        let extension = if entry.original_path.ends_with(".hbc") {
            "hbc"
        } else {
            "js"
        };
        let file = self
            .layout
            .bundle_dir(deployment_id)
            .file(&format!("index.{}", extension));

        let bytes = self.http_client.fetch_bytes(&entry.public_url).await?;
        file.write_atomic(&bytes).await?;

        let path = file.path().to_path_buf();
        info!(
            "Downloaded {} bundle {} for deployment {}",
            platform, entry.original_path, deployment_id
        );
        self.caches.bundles.put(deployment_id.clone(), path.clone());
        Ok(path)
    }

    /// Deployments with a cached bundle path
    pub fn cached_bundles(&self) -> Vec<DeploymentId> {
        let mut ids = self.caches.bundles.keys();
        ids.sort();
        ids
    }

    /// Delete every materialized deployment and bundle and reset the caches
    pub async fn clear_cache(&self) -> Result<(), HostError> {
        self.layout.bundles_dir().delete().await?;
        self.layout.mini_apps_dir().delete().await?;
        self.caches.clear();
        info!("Cleared local deployment cache");
        Ok(())
    }
}
