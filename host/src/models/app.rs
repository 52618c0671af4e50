//! Mini-app catalog records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storage_api::models::MiniAppRow;

use crate::errors::HostError;
use crate::models::deployment::DeploymentId;

/// A mini-app as listed in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiniApp {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon_url: Option<String>,
    pub bundle_url: Option<String>,
    pub version: String,
    pub category: String,
    pub rating: Option<f64>,
    pub downloads: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_featured: bool,
    pub tags: Vec<String>,
    pub deployment_id: Option<String>,
}

impl MiniApp {
    /// Deployment to load: the explicit one, else the app id itself
    pub fn effective_deployment_id(&self) -> DeploymentId {
        match self.explicit_deployment_id() {
            Some(id) => id,
            None => DeploymentId::new(self.id.clone()),
        }
    }

    /// Deployment id set on the record and distinct from the app id
    pub fn explicit_deployment_id(&self) -> Option<DeploymentId> {
        self.deployment_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != self.id)
            .map(DeploymentId::new)
    }

    /// Direct bundle URL usable by the legacy single-file path
    pub fn legacy_bundle_url(&self) -> Option<&str> {
        self.bundle_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

impl TryFrom<MiniAppRow> for MiniApp {
    type Error = HostError;

    fn try_from(row: MiniAppRow) -> Result<Self, Self::Error> {
        let id = row
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| HostError::Catalog("mini-app row without id".to_string()))?;

        Ok(Self {
            name: row.name.unwrap_or_else(|| "Unknown App".to_string()),
            description: row.description.unwrap_or_default(),
            icon_url: row.icon_url,
            bundle_url: row.bundle_url,
            version: row.version.unwrap_or_else(|| "1.0.0".to_string()),
            category: row.category.unwrap_or_default(),
            rating: row.rating.as_ref().and_then(number_as_f64),
            downloads: row.downloads.as_ref().and_then(number_as_u64),
            created_at: row.created_at.as_deref().and_then(parse_timestamp),
            updated_at: row.updated_at.as_deref().and_then(parse_timestamp),
            is_featured: row.is_featured.unwrap_or(false),
            tags: row.tags.unwrap_or_default(),
            deployment_id: row.deployment_id,
            id,
        })
    }
}

fn number_as_f64(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn number_as_u64(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
