//! Deployment models

use std::fmt;

use serde::{Deserialize, Serialize};
use storage_api::models::StorageObject;

/// MIME type used when the store does not report one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Opaque identifier of one published mini-app build
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(String);

impl DeploymentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage prefix holding this deployment's objects
    pub fn storage_prefix(&self) -> String {
        format!("deployments/{}", self.0)
    }

    /// Whether the id is usable as a single path segment
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0 != "."
            && self.0 != ".."
            && !self.0.contains(['/', '\\'])
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeploymentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DeploymentId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// One file under a deployment's storage path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Path relative to the deployment root, unique within a deployment
    pub original_path: String,

    /// Store object id, synthesized when the store reports none
    pub file_id: String,

    /// Leaf name
    pub file_name: String,

    /// Retrievable address
    pub public_url: String,

    /// Absolute store path
    pub upload_path: String,

    /// Size in bytes, informational only
    pub file_size: u64,

    /// Best-effort MIME type
    pub file_type: String,
}

impl FileEntry {
    /// Build a strict entry from a loosely-typed storage row.
    ///
    /// Returns `None` for rows without a usable name.
    pub fn from_storage_object(
        deployment_id: &DeploymentId,
        object: &StorageObject,
        upload_path: &str,
        original_path: &str,
        public_url: String,
    ) -> Option<Self> {
        let name = object.name.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }

        let metadata = object.metadata.as_ref();
        let file_size = metadata
            .and_then(|m| m.get("size"))
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(0);
        let file_type = metadata
            .and_then(|m| m.get("mimetype"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        Some(Self {
            original_path: original_path.to_string(),
            file_id: object
                .id
                .clone()
                .unwrap_or_else(|| format!("{}-{}", deployment_id, name)),
            file_name: name.to_string(),
            public_url,
            upload_path: upload_path.to_string(),
            file_size,
            file_type,
        })
    }

    /// Single-file manifest entry for legacy apps that only have a bundle URL
    pub fn legacy_bundle(bundle_url: &str) -> Self {
        Self {
            original_path: "bundle.js".to_string(),
            file_id: "legacy-bundle".to_string(),
            file_name: "bundle.js".to_string(),
            public_url: bundle_url.to_string(),
            upload_path: "legacy/bundle.js".to_string(),
            file_size: 0,
            file_type: "application/javascript".to_string(),
        }
    }
}

/// Metadata derived from a deployment's manifest file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentManifest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub entry_point: String,
    pub dependencies: Vec<String>,
    pub permissions: Vec<String>,
}

/// A deployment with its listed files and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDeployment {
    pub deployment_id: DeploymentId,
    pub app_id: String,
    pub metadata: DeploymentManifest,
    pub files: Vec<FileEntry>,
}

/// Result of preparing a deployment for execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedApp {
    pub bundle_path: std::path::PathBuf,
    pub metadata: DeploymentManifest,
}
