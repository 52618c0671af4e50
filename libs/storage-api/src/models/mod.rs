//! API models

use serde::{Deserialize, Serialize};

/// Paging options for a storage listing call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    pub limit: u32,
    pub offset: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

/// Sort order requested from the storage list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortBy {
    pub column: String,
    pub order: String,
}

/// Body of a storage list request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRequest {
    pub prefix: String,
    pub limit: u32,
    pub offset: u32,
    #[serde(rename = "sortBy")]
    pub sort_by: SortBy,
}

impl ListRequest {
    pub fn new(prefix: impl Into<String>, options: ListOptions) -> Self {
        Self {
            prefix: prefix.into(),
            limit: options.limit,
            offset: options.offset,
            sort_by: SortBy {
                column: "name".to_string(),
                order: "asc".to_string(),
            },
        }
    }
}

/// One entry returned by a storage listing.
///
/// Folders come back with a null `id` and no metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageObject {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Public URL wrapper returned by the storage client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUrl {
    #[serde(rename = "publicUrl")]
    pub public_url: String,
}

/// Row of the `mini_apps` table as returned by the row API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiniAppRow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub bundle_url: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub rating: Option<serde_json::Value>,
    #[serde(default)]
    pub downloads: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub is_featured: Option<bool>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub deployment_id: Option<String>,
}

/// Error response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "statusCode")]
    pub status_code: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Best available human-readable description
    pub fn describe(&self) -> String {
        match (&self.error, &self.message) {
            (Some(e), Some(m)) => format!("{}: {}", e, m),
            (Some(e), None) => e.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}
