//! One-shot CLI commands

use serde::Serialize;
use tracing::info;

use crate::app::state::AppState;
use crate::errors::HostError;
use crate::models::deployment::{DeploymentId, FileEntry, PreparedApp};

/// One catalog line
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub version: String,
    pub deployment_id: String,
    pub has_legacy_bundle: bool,
}

/// Catalog, newest first
pub async fn list_catalog(state: &AppState) -> Result<Vec<CatalogEntry>, HostError> {
    let apps = state.catalog.list_apps().await?;
    info!("Catalog has {} apps", apps.len());
    Ok(apps
        .into_iter()
        .map(|app| CatalogEntry {
            deployment_id: app.effective_deployment_id().to_string(),
            has_legacy_bundle: app.legacy_bundle_url().is_some(),
            id: app.id,
            name: app.name,
            version: app.version,
        })
        .collect())
}

/// Resolved file manifest of a deployment
pub async fn list_deployment(
    state: &AppState,
    deployment_id: &DeploymentId,
) -> Result<Vec<FileEntry>, HostError> {
    let files = state.loader.load_files(deployment_id).await;
    if files.is_empty() {
        return Err(HostError::Enumeration(format!(
            "no files listed for deployment {}",
            deployment_id
        )));
    }
    Ok(files)
}

/// Download the platform bundle and metadata of a deployment
pub async fn prepare_deployment(
    state: &AppState,
    deployment_id: &DeploymentId,
) -> Result<PreparedApp, HostError> {
    state.loader.prepare_app(deployment_id, None).await
}

/// Delete every local deployment and bundle
pub async fn clear_cache(state: &AppState) -> Result<(), HostError> {
    state.loader.clear_cache().await
}
