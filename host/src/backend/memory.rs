//! In-memory storage and catalog
//!
//! Holds a flat set of object paths and presents them as a folder hierarchy
//! the same way the remote store does: folders are listed as entries with
//! no id and no metadata.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use storage_api::models::{ListOptions, StorageObject};

use crate::backend::{AppCatalog, StorageBackend};
use crate::errors::HostError;
use crate::filesys::dir::Dir;
use crate::models::app::MiniApp;

#[derive(Debug, Clone)]
struct ObjectMeta {
    size: u64,
    mime_type: Option<String>,
}

/// In-memory backend
#[derive(Default)]
pub struct MemoryBackend {
    public_base_url: String,
    objects: BTreeMap<String, ObjectMeta>,
    failing_paths: HashSet<String>,
    apps: Vec<MiniApp>,
    list_calls: AtomicUsize,
}

impl MemoryBackend {
    /// Empty backend whose public URLs are `{public_base_url}/{path}`
    pub fn new(public_base_url: &str) -> Self {
        Self {
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Mirror every file under `dir`, keyed by its path relative to `dir`
    pub async fn from_dir(dir: &Dir, public_base_url: &str) -> Result<Self, HostError> {
        let mut backend = Self::new(public_base_url);
        for relative in dir.list_files_recursive().await? {
            let size = tokio::fs::metadata(dir.path().join(&relative))
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            let mime = guess_mime_type(&relative).map(str::to_string);
            backend = backend.with_object(&relative, size, mime.as_deref());
        }
        Ok(backend)
    }

    /// Add an object at `path`
    pub fn with_object(mut self, path: &str, size: u64, mime_type: Option<&str>) -> Self {
        self.objects.insert(
            path.trim_matches('/').to_string(),
            ObjectMeta {
                size,
                mime_type: mime_type.map(str::to_string),
            },
        );
        self
    }

    /// Make listings of exactly `path` fail
    pub fn with_failing_path(mut self, path: &str) -> Self {
        self.failing_paths.insert(path.trim_matches('/').to_string());
        self
    }

    /// Add a catalog record
    pub fn with_app(mut self, app: MiniApp) -> Self {
        self.apps.push(app);
        self
    }

    /// Number of list calls served so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list(
        &self,
        path: &str,
        options: ListOptions,
    ) -> Result<Vec<StorageObject>, HostError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let path = path.trim_matches('/');
        if self.failing_paths.contains(path) {
            return Err(HostError::Storage(format!("listing {} failed", path)));
        }

        let prefix = format!("{}/", path);
        let mut folders = BTreeSet::new();
        let mut children = Vec::new();

        for (object_path, meta) in self.objects.range(prefix.clone()..) {
            let Some(rest) = object_path.strip_prefix(&prefix) else {
                break;
            };
            match rest.split_once('/') {
                Some((folder, _)) => {
                    if folders.insert(folder.to_string()) {
                        children.push(StorageObject {
                            name: Some(folder.to_string()),
                            id: None,
                            metadata: None,
                        });
                    }
                }
                None => children.push(StorageObject {
                    name: Some(rest.to_string()),
                    id: Some(object_path.clone()),
                    metadata: Some(serde_json::json!({
                        "size": meta.size,
                        "mimetype": meta.mime_type,
                    })),
                }),
            }
        }

        Ok(children
            .into_iter()
            .skip(options.offset as usize)
            .take(options.limit as usize)
            .collect())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl AppCatalog for MemoryBackend {
    async fn list_apps(&self) -> Result<Vec<MiniApp>, HostError> {
        let mut apps = self.apps.clone();
        apps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apps)
    }

    async fn get_app(&self, id: &str) -> Result<MiniApp, HostError> {
        self.apps
            .iter()
            .find(|app| app.id == id)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("app {}", id)))
    }
}

/// MIME type from a file extension, for stores that do not report one
pub fn guess_mime_type(path: &str) -> Option<&'static str> {
    let extension = path.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "json" => "application/json",
        "js" => "application/javascript",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "hbc" => "application/octet-stream",
        _ => return None,
    };
    Some(mime)
}
