//! Deployment resolution policy
//!
//! Decides which deployment a catalog record points at and which file set
//! gets materialized for it.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::HostError;
use crate::models::app::MiniApp;
use crate::models::deployment::{DeploymentId, FileEntry};

/// When the single-file legacy bundle path is taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyFallback {
    /// Only when the listing is empty and the record carries no explicit
    /// deployment id
    #[default]
    WhenListingEmpty,

    /// Whenever the record has a bundle URL; the listing is skipped
    PreferLegacy,

    /// Never
    Disabled,
}

impl LegacyFallback {
    /// Whether the remote listing can be skipped for `app`
    pub fn skips_listing(&self, app: &MiniApp) -> bool {
        *self == LegacyFallback::PreferLegacy && app.legacy_bundle_url().is_some()
    }
}

/// Where a resolved file set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOrigin {
    Listed,
    Legacy,
}

/// Files chosen for one deployment
#[derive(Debug, Clone)]
pub struct ResolvedFiles {
    pub deployment_id: DeploymentId,
    pub files: Vec<FileEntry>,
    pub origin: FileOrigin,
}

/// Pick the file set for `app` given what the listing produced
pub fn resolve_app_files(
    app: &MiniApp,
    listed: Vec<FileEntry>,
    policy: LegacyFallback,
) -> Result<ResolvedFiles, HostError> {
    let deployment_id = app.effective_deployment_id();
    let legacy_url = app.legacy_bundle_url();

    if let (LegacyFallback::PreferLegacy, Some(url)) = (policy, legacy_url) {
        info!("Using legacy bundle for app {} (preferred)", app.id);
        return Ok(legacy(deployment_id, url));
    }

    if !listed.is_empty() {
        return Ok(ResolvedFiles {
            deployment_id,
            files: listed,
            origin: FileOrigin::Listed,
        });
    }

    match (policy, legacy_url) {
        (LegacyFallback::WhenListingEmpty, Some(url)) if app.explicit_deployment_id().is_none() => {
            warn!(
                "No files listed for app {}, falling back to legacy bundle",
                app.id
            );
            Ok(legacy(deployment_id, url))
        }
        _ => Err(HostError::Enumeration(format!(
            "no deployment files found for deployment {} of app {}",
            deployment_id, app.id
        ))),
    }
}

fn legacy(deployment_id: DeploymentId, url: &str) -> ResolvedFiles {
    ResolvedFiles {
        deployment_id,
        files: vec![FileEntry::legacy_bundle(url)],
        origin: FileOrigin::Legacy,
    }
}
