//! Settings file management

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::deploy::classifier::Platform;
use crate::deploy::resolver::LegacyFallback;
use crate::errors::HostError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Host settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Emit JSON log lines on stdout
    #[serde(default)]
    pub json_logs: bool,

    /// Storage and catalog backend
    #[serde(default)]
    pub backend: BackendSettings,

    /// Platform whose bundle is selected
    #[serde(default = "Platform::current")]
    pub platform: Platform,

    /// Local content server
    #[serde(default)]
    pub server: ServerSettings,

    /// Remote listing limits
    #[serde(default)]
    pub lister: ListerSettings,

    /// When the single-file legacy bundle path is used
    #[serde(default)]
    pub legacy_fallback: LegacyFallback,

    /// Automatic retries of a failed session
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base delay between automatic retries
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_delay_secs() -> u64 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_dir: None,
            json_logs: false,
            backend: BackendSettings::default(),
            platform: Platform::current(),
            server: ServerSettings::default(),
            lister: ListerSettings::default(),
            legacy_fallback: LegacyFallback::default(),
            retry_count: default_retry_count(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Settings {
    /// Read settings from `file`; a missing file yields defaults
    pub async fn load(file: &File) -> Result<Self, HostError> {
        if !file.exists().await {
            return Ok(Self::default());
        }
        let settings: Settings = file.read_json().await?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), HostError> {
        if self.server.port_min == 0 || self.server.port_min > self.server.port_max {
            return Err(HostError::ConfigError(format!(
                "invalid port range {}-{}",
                self.server.port_min, self.server.port_max
            )));
        }
        if self.lister.page_limit == 0 {
            return Err(HostError::ConfigError("lister.page_limit must be positive".to_string()));
        }
        url::Url::parse(&self.backend.base_url)
            .map_err(|e| HostError::ConfigError(format!("backend.base_url: {}", e)))?;
        Ok(())
    }
}

/// Storage and catalog backend settings
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL of the backend project
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Storage bucket holding deployments
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Catalog table
    #[serde(default = "default_table")]
    pub table: String,

    /// Anonymous API key
    #[serde(default, skip_serializing)]
    pub anon_key: Option<String>,
}

fn default_backend_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_bucket() -> String {
    "apps".to_string()
}

fn default_table() -> String {
    "mini_apps".to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            bucket: default_bucket(),
            table: default_table(),
            anon_key: None,
        }
    }
}

impl fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSettings")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .field("table", &self.table)
            .field("anon_key", &self.anon_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Local content server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Interface to bind; non-local so other view processes can connect
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Host used in the advertised base URL
    #[serde(default = "default_public_host")]
    pub public_host: String,

    #[serde(default = "default_port_min")]
    pub port_min: u16,

    #[serde(default = "default_port_max")]
    pub port_max: u16,

    /// Random ports tried before giving up
    #[serde(default = "default_bind_attempts")]
    pub bind_attempts: u32,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_public_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port_min() -> u16 {
    3000
}

fn default_port_max() -> u16 {
    9000
}

fn default_bind_attempts() -> u32 {
    3
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            public_host: default_public_host(),
            port_min: default_port_min(),
            port_max: default_port_max(),
            bind_attempts: default_bind_attempts(),
        }
    }
}

/// Remote listing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListerSettings {
    /// Entries requested per listing page
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// Deepest directory level recursed into
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Most pages followed within one directory
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_page_limit() -> u32 {
    100
}

fn default_max_depth() -> usize {
    16
}

fn default_max_pages() -> u32 {
    1000
}

impl Default for ListerSettings {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
        }
    }
}
