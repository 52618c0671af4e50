//! File role classification
//!
//! Pure functions over a listed manifest. Listing order is whatever the
//! store returned; the first match wins.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::deployment::FileEntry;

/// Extensions recognised as executable platform bundles
pub const BUNDLE_EXTENSIONS: [&str; 2] = [".hbc", ".js"];

/// Name of the deployment manifest
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

const JSON_MIME_TYPE: &str = "application/json";

/// Target platform of a compiled bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Web,
}

impl Platform {
    /// Platform of the running build
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else {
            Platform::Web
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Web => "web",
        }
    }

    /// Directory fragment holding this platform's bundles
    pub fn bundle_dir_marker(&self) -> String {
        format!("_expo/static/js/{}/", self.as_str())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            "web" => Ok(Platform::Web),
            _ => Err(format!("Invalid platform: {}", s)),
        }
    }
}

/// Whether `path` ends in a recognised bundle extension
pub fn is_bundle_path(path: &str) -> bool {
    BUNDLE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// First bundle under `_expo/static/js/{platform}/`
pub fn platform_bundle(files: &[FileEntry], platform: Platform) -> Option<&FileEntry> {
    let marker = platform.bundle_dir_marker();
    files
        .iter()
        .find(|f| f.original_path.contains(&marker) && is_bundle_path(&f.original_path))
}

/// The deployment manifest: an exact `manifest.json`, else the first JSON
/// file
pub fn manifest_file(files: &[FileEntry]) -> Option<&FileEntry> {
    files
        .iter()
        .find(|f| f.original_path == MANIFEST_FILE_NAME || f.file_name == MANIFEST_FILE_NAME)
        .or_else(|| files.iter().find(|f| f.file_type == JSON_MIME_TYPE))
}

/// Files that are neither a platform bundle nor the manifest
pub fn static_assets(files: &[FileEntry]) -> Vec<&FileEntry> {
    let manifest = manifest_file(files).map(|f| f.original_path.as_str());
    files
        .iter()
        .filter(|f| Some(f.original_path.as_str()) != manifest)
        .filter(|f| !(f.original_path.contains("_expo/static/js/") && is_bundle_path(&f.original_path)))
        .collect()
}
