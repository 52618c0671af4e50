//! Minihost - Entry Point
//!
//! Resolves a mini-app deployment, materializes it locally and serves it to
//! an embedded web view until the view closes or the process is signalled.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use minihost::app::commands;
use minihost::app::options::AppOptions;
use minihost::app::run::run;
use minihost::app::state::AppState;
use minihost::deploy::orchestrator::SessionSource;
use minihost::errors::HostError;
use minihost::filesys::file::File;
use minihost::logs::{init_logging, LogOptions};
use minihost::models::deployment::DeploymentId;
use minihost::storage::layout::StorageLayout;
use minihost::storage::settings::Settings;
use minihost::utils::{run_diagnostic, version_info};

use tracing::{error, info};

const DEFAULT_LITERAL_DEPLOYMENT: &str = "local-preview";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    let layout = match cli_args.get("home") {
        Some(home) => StorageLayout::new(home),
        None => StorageLayout::default(),
    };

    // Retrieve the settings file
    let settings_file = match cli_args.get("settings") {
        Some(path) => File::new(path),
        None => layout.settings_file(),
    };
    let settings = match Settings::load(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {}", e);
            return;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: Some(
            settings
                .log_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(|| layout.logs_dir().path().to_path_buf()),
        ),
        json_format: settings.json_logs,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = AppOptions::from_settings(&settings, layout);

    // One-shot commands
    let deployment = cli_args.get("deployment").map(DeploymentId::new);
    if cli_args.contains_key("diagnostic") || cli_args.contains_key("diag") {
        match AppState::init(&options).await {
            Ok(state) => run_diagnostic(&state, deployment.as_ref()).await,
            Err(e) => error!("Failed to initialize: {e}"),
        }
        return;
    }
    if let Err(e) = run_command(&cli_args, &options, deployment.as_ref()).await {
        error!("{e}");
        eprintln!("{}", e.user_message());
        return;
    }
    if ["catalog", "list", "prepare", "clear-cache"]
        .iter()
        .any(|command| cli_args.contains_key(*command))
    {
        return;
    }

    // Run a viewing session starting here
    let source = match session_source(&cli_args, deployment).await {
        Ok(Some(source)) => source,
        Ok(None) => {
            error!("Nothing to host");
            error!("Run: minihost --app=<id> | --deployment=<id> | --html=<file>");
            return;
        }
        Err(e) => {
            error!("Unable to read the session source: {e}");
            return;
        }
    };

    info!("Running minihost with options: {:?}", options);
    match run(options, source, await_shutdown_signal()).await {
        Ok(exit) => info!("Session ended: {:?}", exit),
        Err(e) => error!("Failed to run the session: {e}"),
    }
}

async fn run_command(
    cli_args: &HashMap<String, String>,
    options: &AppOptions,
    deployment: Option<&DeploymentId>,
) -> Result<(), HostError> {
    let wants = |key: &str| cli_args.contains_key(key);
    if !(wants("catalog") || wants("list") || wants("prepare") || wants("clear-cache")) {
        return Ok(());
    }
    let state = AppState::init(options).await?;

    if wants("catalog") {
        let catalog = commands::list_catalog(&state).await?;
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    }
    if wants("list") || wants("prepare") {
        let deployment_id = deployment.ok_or_else(|| {
            HostError::ConfigError("--deployment=<id> is required".to_string())
        })?;
        if wants("list") {
            let files = commands::list_deployment(&state, deployment_id).await?;
            println!("{}", serde_json::to_string_pretty(&files)?);
        }
        if wants("prepare") {
            let prepared = commands::prepare_deployment(&state, deployment_id).await?;
            println!("{}", serde_json::to_string_pretty(&prepared)?);
        }
    }
    if wants("clear-cache") {
        commands::clear_cache(&state).await?;
        println!("Cache cleared");
    }
    Ok(())
}

async fn session_source(
    cli_args: &HashMap<String, String>,
    deployment: Option<DeploymentId>,
) -> Result<Option<SessionSource>, HostError> {
    if let Some(path) = cli_args.get("html") {
        let content = File::new(path).read_string().await?;
        return Ok(Some(SessionSource::Literal {
            deployment_id: deployment
                .unwrap_or_else(|| DeploymentId::new(DEFAULT_LITERAL_DEPLOYMENT)),
            content,
        }));
    }
    if let Some(app_id) = cli_args.get("app") {
        return Ok(Some(SessionSource::AppId(app_id.clone())));
    }
    Ok(deployment.map(SessionSource::Deployment))
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (Ok(mut sigterm), Ok(mut sigint)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) else {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received, shutting down...");
            }
            return;
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down...");
        }
    }
}
