//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::backend::rest::RestBackend;
use crate::backend::{AppCatalog, StorageBackend};
use crate::bridge::protocol::HostInfo;
use crate::cache::Caches;
use crate::deploy::lister::StorageLister;
use crate::deploy::loader::BundleLoader;
use crate::deploy::manifest::MetadataLoader;
use crate::deploy::materializer::Materializer;
use crate::deploy::orchestrator::{Orchestrator, OrchestratorSettings};
use crate::errors::HostError;
use crate::http::client::HttpClient;
use crate::storage::kv::{FileKvStore, KeyValueStore};
use crate::storage::layout::StorageLayout;

/// Main application state
pub struct AppState {
    /// Storage layout
    pub layout: StorageLayout,

    /// HTTP client for backend communication and downloads
    pub http_client: Arc<HttpClient>,

    /// Object store
    pub storage: Arc<dyn StorageBackend>,

    /// Mini-app catalog
    pub catalog: Arc<dyn AppCatalog>,

    /// Deployment caches
    pub caches: Caches,

    /// Bundle loading service
    pub loader: Arc<BundleLoader>,

    /// Session orchestrator
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Build the state against the configured REST backend
    pub async fn init(options: &AppOptions) -> Result<Self, HostError> {
        let http_client = Arc::new(match &options.backend.anon_key {
            Some(key) => HttpClient::with_api_key(&options.backend.base_url, key.clone())?,
            None => HttpClient::new(&options.backend.base_url)?,
        });
        let backend = Arc::new(RestBackend::new(
            http_client.clone(),
            &options.backend.bucket,
            &options.backend.table,
        )?);

        Self::with_backends(options, http_client, backend.clone(), backend).await
    }

    /// Build the state against explicit storage and catalog backends
    pub async fn with_backends(
        options: &AppOptions,
        http_client: Arc<HttpClient>,
        storage: Arc<dyn StorageBackend>,
        catalog: Arc<dyn AppCatalog>,
    ) -> Result<Self, HostError> {
        let layout = options.storage.layout.clone();
        layout.setup().await?;

        let caches = Caches::new(options.storage.cache_capacities);
        let lister = Arc::new(StorageLister::new(storage.clone(), &options.lister));
        let materializer = Arc::new(Materializer::new(
            http_client.clone(),
            layout.clone(),
            caches.clone(),
        ));
        let metadata = Arc::new(MetadataLoader::new(
            http_client.clone(),
            caches.metadata.clone(),
        ));
        let loader = Arc::new(BundleLoader::new(
            lister.clone(),
            materializer.clone(),
            metadata.clone(),
            http_client.clone(),
            options.platform,
        ));

        let kv_store: Arc<dyn KeyValueStore> =
            Arc::new(FileKvStore::open(layout.kv_store_file()).await?);
        let orchestrator = Arc::new(Orchestrator::new(
            catalog.clone(),
            lister,
            materializer,
            metadata,
            kv_store,
            OrchestratorSettings {
                server: options.server.clone(),
                legacy_fallback: options.legacy_fallback,
                host_info: HostInfo::default(),
            },
        ));

        info!("Storage initialized at {}", layout.base_dir.display());
        Ok(Self {
            layout,
            http_client,
            storage,
            catalog,
            caches,
            loader,
            orchestrator,
        })
    }
}
