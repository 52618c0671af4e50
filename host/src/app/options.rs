//! Application configuration options

use std::time::Duration;

use secrecy::SecretString;

use crate::cache::CacheCapacities;
use crate::deploy::classifier::Platform;
use crate::deploy::fsm::FsmSettings;
use crate::deploy::resolver::LegacyFallback;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{ListerSettings, ServerSettings, Settings};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Backend configuration
    pub backend: BackendOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Local server configuration
    pub server: ServerSettings,

    /// Remote listing configuration
    pub lister: ListerSettings,

    /// Platform whose bundle is selected
    pub platform: Platform,

    /// Legacy bundle policy
    pub legacy_fallback: LegacyFallback,

    /// Session retry settings
    pub fsm_settings: FsmSettings,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            backend: BackendOptions::default(),
            storage: StorageOptions::default(),
            server: ServerSettings::default(),
            lister: ListerSettings::default(),
            platform: Platform::current(),
            legacy_fallback: LegacyFallback::default(),
            fsm_settings: FsmSettings::default(),
        }
    }
}

impl AppOptions {
    /// Options derived from a settings file
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        Self {
            backend: BackendOptions {
                base_url: settings.backend.base_url.clone(),
                bucket: settings.backend.bucket.clone(),
                table: settings.backend.table.clone(),
                anon_key: settings
                    .backend
                    .anon_key
                    .clone()
                    .map(SecretString::from),
            },
            storage: StorageOptions {
                layout,
                ..Default::default()
            },
            server: settings.server.clone(),
            lister: settings.lister.clone(),
            platform: settings.platform,
            legacy_fallback: settings.legacy_fallback,
            fsm_settings: FsmSettings {
                retry_count: settings.retry_count,
                retry_delay: Duration::from_secs(settings.retry_delay_secs),
            },
            ..Default::default()
        }
    }
}

/// Lifecycle options for a session
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,

    /// Ceiling of the retry backoff
    pub max_retry_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(10),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

/// Backend connection options
#[derive(Debug, Clone)]
pub struct BackendOptions {
    pub base_url: String,
    pub bucket: String,
    pub table: String,
    pub anon_key: Option<SecretString>,
}

impl Default for BackendOptions {
    fn default() -> Self {
        let settings = crate::storage::settings::BackendSettings::default();
        Self {
            base_url: settings.base_url,
            bucket: settings.bucket,
            table: settings.table,
            anon_key: None,
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,

    /// Cache capacities
    pub cache_capacities: CacheCapacities,
}
