//! Remote deployment enumeration
//!
//! Walks the store under `deployments/{id}` and flattens it into a file
//! manifest. Names containing a `.` are files; anything else is a folder
//! and is recursed into.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};
use storage_api::models::{ListOptions, StorageObject};
use tracing::{debug, error, info, warn};

use crate::backend::StorageBackend;
use crate::errors::HostError;
use crate::models::deployment::{DeploymentId, FileEntry};
use crate::storage::settings::ListerSettings;

/// Recursive lister over a storage backend
pub struct StorageLister {
    backend: Arc<dyn StorageBackend>,
    page_limit: u32,
    max_depth: usize,
    max_pages: u32,
}

impl StorageLister {
    pub fn new(backend: Arc<dyn StorageBackend>, settings: &ListerSettings) -> Self {
        Self {
            backend,
            page_limit: settings.page_limit.max(1),
            max_depth: settings.max_depth,
            max_pages: settings.max_pages.max(1),
        }
    }

    /// List every file of a deployment. Never fails: errors are logged and
    /// yield an empty manifest.
    pub async fn list_deployment_files(&self, deployment_id: &DeploymentId) -> Vec<FileEntry> {
        match self.try_list_deployment_files(deployment_id).await {
            Ok(files) => files,
            Err(e) => {
                error!("Failed to list deployment {}: {}", deployment_id, e);
                Vec::new()
            }
        }
    }

    /// List every file of a deployment, reporting why nothing was found
    pub async fn try_list_deployment_files(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<Vec<FileEntry>, HostError> {
        if !deployment_id.is_valid() {
            return Err(HostError::Enumeration(format!(
                "invalid deployment id {:?}",
                deployment_id.as_str()
            )));
        }

        let files = self
            .walk(deployment_id, String::new(), 0)
            .await
            .map_err(|e| HostError::Enumeration(e.to_string()))?;

        let mut seen = HashSet::new();
        let files: Vec<FileEntry> = files
            .into_iter()
            .filter(|f| {
                let unique = seen.insert(f.original_path.clone());
                if !unique {
                    warn!("Duplicate path {} in deployment {}", f.original_path, deployment_id);
                }
                unique
            })
            .collect();

        if files.is_empty() {
            return Err(HostError::Enumeration(format!(
                "no files under {}",
                deployment_id.storage_prefix()
            )));
        }

        info!("Listed {} files for deployment {}", files.len(), deployment_id);
        Ok(files)
    }

    /// Files of one directory, then those of its subdirectories in listing
    /// order. Only the root listing error propagates.
    fn walk<'a>(
        &'a self,
        deployment_id: &'a DeploymentId,
        relative: String,
        depth: usize,
    ) -> BoxFuture<'a, Result<Vec<FileEntry>, HostError>> {
        async move {
            let dir_path = if relative.is_empty() {
                deployment_id.storage_prefix()
            } else {
                format!("{}/{}", deployment_id.storage_prefix(), relative)
            };

            let objects = self.list_all(&dir_path).await?;
            let mut files = Vec::new();
            let mut subdirs = Vec::new();

            for object in &objects {
                let Some(name) = entry_name(object) else {
                    warn!("Skipping malformed entry under {}: {:?}", dir_path, object.name);
                    continue;
                };
                let original_path = if relative.is_empty() {
                    name.to_string()
                } else {
                    format!("{}/{}", relative, name)
                };

                if name.contains('.') {
                    let upload_path = format!("{}/{}", dir_path, name);
                    let public_url = self.backend.public_url(&upload_path);
                    if let Some(entry) = FileEntry::from_storage_object(
                        deployment_id,
                        object,
                        &upload_path,
                        &original_path,
                        public_url,
                    ) {
                        files.push(entry);
                    }
                } else {
                    subdirs.push(original_path);
                }
            }

            if subdirs.is_empty() {
                return Ok(files);
            }
            if depth >= self.max_depth {
                warn!(
                    "Depth limit {} reached under {}, skipping {} folders",
                    self.max_depth,
                    dir_path,
                    subdirs.len()
                );
                return Ok(files);
            }

            let nested = join_all(
                subdirs
                    .iter()
                    .map(|subdir| self.walk(deployment_id, subdir.clone(), depth + 1)),
            )
            .await;

            for (subdir, result) in subdirs.iter().zip(nested) {
                match result {
                    Ok(mut entries) => files.append(&mut entries),
                    Err(e) => warn!("Failed to list folder {}: {}", subdir, e),
                }
            }
            Ok(files)
        }
        .boxed()
    }

    /// Every entry of one directory, following pages until a short one.
    /// A full page that only repeats names already seen, or running past
    /// `max_pages`, fails the directory.
    async fn list_all(&self, path: &str) -> Result<Vec<StorageObject>, HostError> {
        let mut objects = Vec::new();
        let mut names = HashSet::new();
        let mut offset = 0;

        for _ in 0..self.max_pages {
            let options = ListOptions {
                limit: self.page_limit,
                offset,
            };
            let page = self.backend.list(path, options).await?;
            let count = page.len() as u32;
            debug!("Listed {} entries under {} at offset {}", count, path, offset);

            let before = names.len();
            names.extend(page.iter().filter_map(|o| o.name.clone()));
            let fresh = names.len() > before;
            objects.extend(page);

            if count < self.page_limit {
                return Ok(objects);
            }
            if !fresh {
                return Err(HostError::Enumeration(format!(
                    "listing of {} repeats itself at offset {}",
                    path, offset
                )));
            }
            offset += count;
        }

        Err(HostError::Enumeration(format!(
            "listing of {} exceeds {} pages",
            path, self.max_pages
        )))
    }
}

fn entry_name(object: &StorageObject) -> Option<&str> {
    let name = object.name.as_deref()?.trim();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return None;
    }
    Some(name)
}
