//! REST implementation of the storage and catalog capabilities

use async_trait::async_trait;
use storage_api::models::{ListOptions, ListRequest, MiniAppRow, StorageObject};
use tracing::warn;
use url::Url;

use crate::backend::{AppCatalog, StorageBackend};
use crate::errors::HostError;
use crate::http::client::HttpClient;
use crate::models::app::MiniApp;

/// Object storage + row API backend
pub struct RestBackend {
    http_client: std::sync::Arc<HttpClient>,
    base_url: Url,
    bucket: String,
    table: String,
}

impl RestBackend {
    pub fn new(
        http_client: std::sync::Arc<HttpClient>,
        bucket: &str,
        table: &str,
    ) -> Result<Self, HostError> {
        let base_url = Url::parse(http_client.base_url())
            .map_err(|e| HostError::ConfigError(format!("invalid backend URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(HostError::ConfigError(format!(
                "backend URL cannot be a base: {}",
                base_url
            )));
        }

        Ok(Self {
            http_client,
            base_url,
            bucket: bucket.to_string(),
            table: table.to_string(),
        })
    }

    fn rows_path(&self, query: &str) -> String {
        format!("/rest/v1/{}?{}", self.table, query)
    }
}

#[async_trait]
impl StorageBackend for RestBackend {
    async fn list(
        &self,
        path: &str,
        options: ListOptions,
    ) -> Result<Vec<StorageObject>, HostError> {
        let endpoint = format!("/storage/v1/object/list/{}", self.bucket);
        let body = ListRequest::new(path, options);
        self.http_client.post(&endpoint, &body).await
    }

    fn public_url(&self, path: &str) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["storage", "v1", "object", "public", self.bucket.as_str()])
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        url.to_string()
    }
}

#[async_trait]
impl AppCatalog for RestBackend {
    async fn list_apps(&self) -> Result<Vec<MiniApp>, HostError> {
        let path = self.rows_path("select=*&order=created_at.desc");
        let rows: Vec<MiniAppRow> = self
            .http_client
            .get(&path, &[])
            .await
            .map_err(|e| HostError::Catalog(e.to_string()))?;

        let apps = rows
            .into_iter()
            .filter_map(|row| match MiniApp::try_from(row) {
                Ok(app) => Some(app),
                Err(e) => {
                    warn!("Skipping malformed catalog row: {}", e);
                    None
                }
            })
            .collect();
        Ok(apps)
    }

    async fn get_app(&self, id: &str) -> Result<MiniApp, HostError> {
        let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
        let path = self.rows_path(&format!("select=*&id=eq.{}&limit=1", encoded));
        let rows: Vec<MiniAppRow> = self
            .http_client
            .get(&path, &[])
            .await
            .map_err(|e| HostError::Catalog(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| HostError::NotFound(format!("app {}", id)))?;
        MiniApp::try_from(row)
    }
}
