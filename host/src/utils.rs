//! Utility functions

use std::time::Duration;

use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::app::state::AppState;
use crate::deploy::classifier::{manifest_file, platform_bundle, Platform};
use crate::models::deployment::DeploymentId;

/// Version information for the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Cooldown options for exponential backoff
#[derive(Debug, Clone)]
pub struct CooldownOptions {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for CooldownOptions {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate exponential backoff delay
pub fn calc_exp_backoff(options: &CooldownOptions, attempt: u32) -> Duration {
    let delay_secs = options.base_delay.as_secs_f64() * options.multiplier.powi(attempt as i32);
    let capped_delay = delay_secs.min(options.max_delay.as_secs_f64());
    Duration::from_secs_f64(capped_delay)
}

/// Generate a random UUID v4
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn report(label: &str, ok: bool, detail: impl std::fmt::Display) {
    let mark = if ok { "ok".green() } else { "fail".red() };
    println!("  [{}] {:<18} {}", mark, label, detail);
}

/// Print a reachability and content report for the configured backend.
///
/// With a deployment, the report also lists its files and which bundles and
/// manifest would be picked.
pub async fn run_diagnostic(state: &AppState, deployment_id: Option<&DeploymentId>) {
    let version = version_info();
    println!(
        "{} {} ({}, built {})",
        "minihost".bold(),
        version.version,
        version.git_hash,
        version.build_time
    );

    println!("{}", "Backend".bold());
    report("base url", true, state.http_client.base_url());
    match state.catalog.list_apps().await {
        Ok(apps) => report("catalog", true, format!("{} apps", apps.len())),
        Err(e) => report("catalog", false, e),
    }

    println!("{}", "Local storage".bold());
    for (label, dir) in [
        ("mini-apps", state.layout.mini_apps_dir()),
        ("bundles", state.layout.bundles_dir()),
    ] {
        let exists = dir.exists().await;
        report(label, exists, dir.path().display());
    }
    report(
        "cached bundles",
        true,
        format!("{}", state.loader.cached_bundles().len()),
    );

    let Some(deployment_id) = deployment_id else {
        return;
    };

    println!("{} {}", "Deployment".bold(), deployment_id);
    let files = state.loader.load_files(deployment_id).await;
    report("files", !files.is_empty(), format!("{} listed", files.len()));
    if files.is_empty() {
        return;
    }

    for platform in [Platform::Android, Platform::Ios] {
        match platform_bundle(&files, platform) {
            Some(entry) => report(platform.as_str(), true, &entry.original_path),
            None => report(platform.as_str(), false, "no bundle".dimmed()),
        }
    }
    match manifest_file(&files) {
        Some(entry) => report("manifest", true, &entry.original_path),
        None => report("manifest", false, "none".dimmed()),
    }

    for file in &files {
        println!(
            "    {:<40} {:<28} {:>10}  {}",
            file.original_path,
            file.file_type.cyan(),
            file.file_size,
            file.public_url.dimmed()
        );
    }
}
