//! Deployment manifest parsing and loading

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::MetadataCache;
use crate::deploy::classifier::manifest_file;
use crate::errors::HostError;
use crate::http::client::HttpClient;
use crate::models::deployment::{DeploymentId, DeploymentManifest, FileEntry};

const DEFAULT_NAME: &str = "Unknown App";
const DEFAULT_VERSION: &str = "1.0.0";
const DEFAULT_ENTRY_POINT: &str = "index.js";

/// Parse raw manifest JSON into deployment metadata.
///
/// Only the top-level shape is strict; missing, empty or mistyped fields
/// take their defaults.
pub fn parse_manifest(
    deployment_id: &DeploymentId,
    raw: &[u8],
) -> Result<DeploymentManifest, HostError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| HostError::ManifestParse(format!("{}: {}", deployment_id, e)))?;
    let object = value.as_object().ok_or_else(|| {
        HostError::ManifestParse(format!("{}: manifest is not a JSON object", deployment_id))
    })?;

    let text = |key: &str, default: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    let dependencies = object
        .get("dependencies")
        .and_then(Value::as_object)
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default();

    let permissions = object
        .get("permissions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(DeploymentManifest {
        id: deployment_id.to_string(),
        name: text("name", DEFAULT_NAME),
        description: text("description", ""),
        version: text("version", DEFAULT_VERSION),
        entry_point: text("main", DEFAULT_ENTRY_POINT),
        dependencies,
        permissions,
    })
}

/// Fetches and caches deployment metadata
pub struct MetadataLoader {
    http_client: Arc<HttpClient>,
    cache: Arc<MetadataCache>,
}

impl MetadataLoader {
    pub fn new(http_client: Arc<HttpClient>, cache: Arc<MetadataCache>) -> Self {
        Self { http_client, cache }
    }

    /// Metadata of a deployment; `None` when there is no manifest or it
    /// cannot be read
    pub async fn load_metadata(
        &self,
        deployment_id: &DeploymentId,
        files: &[FileEntry],
    ) -> Option<DeploymentManifest> {
        if let Some(metadata) = self.cache.get(deployment_id) {
            debug!("Metadata cache hit for deployment {}", deployment_id);
            return Some(metadata);
        }

        let Some(entry) = manifest_file(files) else {
            debug!("Deployment {} has no manifest", deployment_id);
            return None;
        };

        let result = match self.http_client.fetch_bytes(&entry.public_url).await {
            Ok(raw) => parse_manifest(deployment_id, &raw),
            Err(e) => Err(e),
        };

        match result {
            Ok(metadata) => {
                self.cache.put(deployment_id.clone(), metadata.clone());
                Some(metadata)
            }
            Err(e) => {
                warn!(
                    "Ignoring manifest {} of deployment {}: {}",
                    entry.original_path, deployment_id, e
                );
                None
            }
        }
    }
}
