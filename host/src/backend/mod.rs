//! Remote storage and catalog capabilities
//!
//! The object store and the catalog database are external collaborators.
//! Core logic only sees them through these traits.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use storage_api::models::{ListOptions, StorageObject};

use crate::errors::HostError;
use crate::models::app::MiniApp;

/// Hierarchical object store
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// List the immediate children of `path`, one page at a time
    async fn list(
        &self,
        path: &str,
        options: ListOptions,
    ) -> Result<Vec<StorageObject>, HostError>;

    /// Public retrieval URL of the object at `path`
    fn public_url(&self, path: &str) -> String;
}

/// Mini-app catalog
#[async_trait]
pub trait AppCatalog: Send + Sync {
    /// All apps, newest first
    async fn list_apps(&self) -> Result<Vec<MiniApp>, HostError>;

    /// One app by id
    async fn get_app(&self, id: &str) -> Result<MiniApp, HostError>;
}
