//! Error types for the mini-app host

use thiserror::Error;

/// Main error type for the mini-app host
#[derive(Error, Debug)]
pub enum HostError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Remote listing failed or returned nothing
    #[error("Enumeration error: {0}")]
    Enumeration(String),

    /// Zero files were written for a deployment
    #[error("Materialization error: {0}")]
    Materialization(String),

    /// No file matches the running platform
    #[error("Bundle not found: {0}")]
    BundleNotFound(String),

    /// The local server could not bind
    #[error("Server start error: {0}")]
    ServerStart(String),

    /// Malformed or unmatched bridge message
    #[error("Protocol anomaly: {0}")]
    ProtocolAnomaly(String),

    /// Manifest present but unparsable
    #[error("Manifest parse error: {0}")]
    ManifestParse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HostError {
    /// Short message suitable for showing to the user.
    ///
    /// The `Display` form carries the detail and goes to the log instead.
    pub fn user_message(&self) -> &'static str {
        match self {
            HostError::Enumeration(_) => "No deployment files found for this app",
            HostError::Materialization(_) | HostError::BundleNotFound(_) => {
                "Unable to load this app right now"
            }
            HostError::ServerStart(_) => "Unable to start this app",
            HostError::NotFound(_) => "App not found",
            HostError::Catalog(_) => "Failed to load app",
            _ => "Something went wrong loading this app",
        }
    }
}

impl From<anyhow::Error> for HostError {
    fn from(err: anyhow::Error) -> Self {
        HostError::Internal(err.to_string())
    }
}
