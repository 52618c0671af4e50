//! End-to-end deployment pipeline tests

use minihost::app::commands;
use minihost::app::run::start_with_retries;
use minihost::bridge::client::BridgeClient;
use minihost::bridge::methods::SessionSignal;
use minihost::deploy::fsm::SessionState;
use minihost::deploy::orchestrator::SessionSource;
use minihost::errors::HostError;
use minihost::filesys::dir::Dir;
use minihost::models::deployment::{DeploymentId, FileEntry};
use minihost::server::handlers::with_shim;

use crate::fixtures::{abc_store, harness, mini_app, write_fixture, ABC_INDEX};

async fn fetch(url: &str) -> String {
    reqwest::get(url).await.unwrap().text().await.unwrap()
}

fn file_at(base_url: &str, path: &str) -> FileEntry {
    FileEntry {
        original_path: path.to_string(),
        file_id: path.to_string(),
        file_name: path.rsplit('/').next().unwrap_or(path).to_string(),
        public_url: format!("{}/late/{}", base_url, path),
        upload_path: format!("late/{}", path),
        file_size: 0,
        file_type: "text/html".to_string(),
    }
}

#[tokio::test]
async fn test_abc_deployment_end_to_end() {
    let harness = harness(abc_store().await, |backend, _| backend).await;
    let mut session = harness
        .state
        .orchestrator
        .open_session(SessionSource::Deployment(DeploymentId::new("abc")));
    assert_eq!(session.state(), SessionState::Idle);

    let info = session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(info.deployment_id, DeploymentId::new("abc"));
    assert_eq!(info.files_written, 5);
    assert!(info.files_failed.is_empty());
    assert!(info.entry_url.ends_with("/index.html"));
    assert!(info.bridge_url.starts_with("ws://127.0.0.1:"));
    assert!(info.bridge_url.ends_with("/__bridge"));

    let metadata = info.metadata.clone().unwrap();
    assert_eq!(metadata.id, "abc");
    assert_eq!(metadata.name, "Abc");
    assert_eq!(metadata.version, "2.1.0");
    assert_eq!(metadata.entry_point, "index.js");
    assert_eq!(metadata.dependencies, vec!["react".to_string()]);
    assert_eq!(metadata.permissions, vec!["storage".to_string()]);

    assert_eq!(fetch(&info.entry_url).await, with_shim(ABC_INDEX));
    assert_eq!(
        fetch(&format!("{}/_expo/static/js/ios/index.hbc", info.base_url)).await,
        "ios-bundle"
    );

    session.teardown().await;
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.server().is_running());
    assert!(session.info().is_none());
    assert!(reqwest::get(&info.entry_url).await.is_err());

    harness.cleanup().await;
}

#[tokio::test]
async fn test_empty_deployment_fails_with_user_message() {
    let harness = harness(abc_store().await, |backend, _| backend).await;
    let mut session = harness
        .state
        .orchestrator
        .open_session(SessionSource::Deployment(DeploymentId::new("missing")));

    let result = session.start().await;
    assert!(matches!(result, Err(HostError::Enumeration(_))));
    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(
        session.error_message(),
        Some("No deployment files found for this app")
    );
    assert!(!session.server().is_running());
    assert!(session.fsm().can_retry(harness.options.fsm_settings.retry_count));

    harness.cleanup().await;
}

#[tokio::test]
async fn test_retry_after_failed_materialization() {
    let harness = harness(abc_store().await, |backend, _| backend).await;
    let files = vec![file_at(&harness.files.base_url, "index.html")];
    let mut session = harness
        .state
        .orchestrator
        .open_session(SessionSource::Files {
            deployment_id: DeploymentId::new("late"),
            files,
        });

    let result = session.start().await;
    assert!(matches!(result, Err(HostError::Materialization(_))));
    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(session.fsm().retry_count(), 1);

    // The file shows up before the retry
    write_fixture(&harness.store, "late/index.html", "<p>late</p>").await;

    let info = session.retry().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.fsm().retry_count(), 0);
    assert!(session.error_message().is_none());
    assert_eq!(fetch(&info.entry_url).await, with_shim("<p>late</p>"));

    session.teardown().await;
    harness.cleanup().await;
}

#[tokio::test]
async fn test_partial_materialization_still_serves() {
    let harness = harness(abc_store().await, |backend, _| backend).await;
    let mut files = harness
        .state
        .loader
        .load_files(&DeploymentId::new("abc"))
        .await;
    files.push(file_at(&harness.files.base_url, "gone.html"));

    let mut session = harness
        .state
        .orchestrator
        .open_session(SessionSource::Files {
            deployment_id: DeploymentId::new("abc"),
            files,
        });

    let info = session.start().await.unwrap();
    assert_eq!(info.files_written, 5);
    assert_eq!(info.files_failed, vec!["gone.html".to_string()]);
    assert_eq!(fetch(&info.entry_url).await, with_shim(ABC_INDEX));

    session.teardown().await;
    harness.cleanup().await;
}

#[tokio::test]
async fn test_literal_content_session() {
    let harness = harness(abc_store().await, |backend, _| backend).await;
    let mut session = harness
        .state
        .orchestrator
        .open_session(SessionSource::Literal {
            deployment_id: DeploymentId::new("preview"),
            content: "<h1>preview</h1>".to_string(),
        });

    let info = session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert!(info.metadata.is_none());
    assert_eq!(session.context().literal.as_deref(), Some("<h1>preview</h1>"));
    assert_eq!(fetch(&info.entry_url).await, with_shim("<h1>preview</h1>"));
    assert_eq!(harness.backend.list_calls(), 0);

    session.teardown().await;
    harness.cleanup().await;
}

#[tokio::test]
async fn test_catalog_app_with_explicit_deployment() {
    let harness = harness(abc_store().await, |backend, _| {
        backend.with_app(mini_app("app-abc", Some("abc"), None))
    })
    .await;
    let mut session = harness
        .state
        .orchestrator
        .open_session(SessionSource::AppId("app-abc".to_string()));

    let info = session.start().await.unwrap();
    assert_eq!(info.deployment_id, DeploymentId::new("abc"));
    assert_eq!(fetch(&info.entry_url).await, with_shim(ABC_INDEX));

    session.teardown().await;
    harness.cleanup().await;
}

#[tokio::test]
async fn test_legacy_bundle_fallback() {
    let store = Dir::create_temp_dir("minihost-store").await.unwrap();
    write_fixture(&store, "legacy/bundle.js", "legacy();").await;
    let harness = harness(store, |backend, base_url| {
        backend.with_app(mini_app(
            "old-app",
            None,
            Some(format!("{}/legacy/bundle.js", base_url).as_str()),
        ))
    })
    .await;

    let mut session = harness
        .state
        .orchestrator
        .open_session(SessionSource::AppId("old-app".to_string()));
    let info = session.start().await.unwrap();

    assert_eq!(info.deployment_id, DeploymentId::new("old-app"));
    assert!(info.entry_url.ends_with("/bundle.js"));
    assert_eq!(fetch(&info.entry_url).await, "legacy();");

    session.teardown().await;
    harness.cleanup().await;
}

#[tokio::test]
async fn test_unknown_app() {
    let harness = harness(abc_store().await, |backend, _| backend).await;
    let mut session = harness
        .state
        .orchestrator
        .open_session(SessionSource::AppId("nope".to_string()));

    assert!(matches!(session.start().await, Err(HostError::NotFound(_))));
    assert_eq!(session.error_message(), Some("App not found"));

    harness.cleanup().await;
}

#[tokio::test]
async fn test_content_close_reaches_session() {
    let harness = harness(abc_store().await, |backend, _| backend).await;
    let mut session = harness
        .state
        .orchestrator
        .open_session(SessionSource::Deployment(DeploymentId::new("abc")));
    let info = session.start().await.unwrap();

    let client = BridgeClient::connect(&info.bridge_url).await.unwrap();
    client.set_item("level", "3").await.unwrap();
    client.close_app().await.unwrap();
    assert_eq!(session.next_signal().await, Some(SessionSignal::CloseRequested));

    // Storage survives the session
    session.teardown().await;
    let info = session.start().await.unwrap();
    let client = BridgeClient::connect(&info.bridge_url).await.unwrap();
    assert_eq!(client.get_item("level").await.unwrap(), Some("3".to_string()));

    session.teardown().await;
    harness.cleanup().await;
}

#[tokio::test]
async fn test_restart() {
    let harness = harness(abc_store().await, |backend, _| backend).await;
    let mut session = harness
        .state
        .orchestrator
        .open_session(SessionSource::Deployment(DeploymentId::new("abc")));
    session.start().await.unwrap();

    let info = session.restart().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.server().is_running());
    assert_eq!(fetch(&info.entry_url).await, with_shim(ABC_INDEX));

    session.teardown().await;
    harness.cleanup().await;
}

#[tokio::test]
async fn test_start_with_retries_gives_up() {
    let harness = harness(abc_store().await, |backend, _| backend).await;
    let mut session = harness
        .state
        .orchestrator
        .open_session(SessionSource::Deployment(DeploymentId::new("missing")));

    let result = start_with_retries(&mut session, &harness.options).await;
    assert!(matches!(result, Err(HostError::Enumeration(_))));
    assert_eq!(session.state(), SessionState::Error);

    // One listing per attempt: the first plus two retries
    assert_eq!(harness.backend.list_calls(), 3);

    harness.cleanup().await;
}

#[tokio::test]
async fn test_prepare_platform_bundle() {
    let harness = harness(abc_store().await, |backend, _| backend).await;
    let id = DeploymentId::new("abc");

    let prepared = commands::prepare_deployment(&harness.state, &id).await.unwrap();
    assert!(prepared.bundle_path.ends_with("bundles/abc/index.hbc"));
    assert_eq!(
        tokio::fs::read_to_string(&prepared.bundle_path).await.unwrap(),
        "android-bundle"
    );
    assert_eq!(prepared.metadata.name, "Abc");
    assert_eq!(harness.state.loader.cached_bundles(), vec![id.clone()]);

    let deployment = harness.state.loader.load_app_deployment(&id).await.unwrap();
    assert_eq!(deployment.files.len(), 5);
    assert_eq!(deployment.metadata.version, "2.1.0");

    let manifest = harness
        .state
        .loader
        .get_file_content(&id, "manifest.json")
        .await
        .unwrap();
    assert!(manifest.contains("\"Abc\""));

    commands::clear_cache(&harness.state).await.unwrap();
    assert!(harness.state.loader.cached_bundles().is_empty());
    assert!(!prepared.bundle_path.exists());

    harness.cleanup().await;
}

#[tokio::test]
async fn test_catalog_and_listing_commands() {
    let harness = harness(abc_store().await, |backend, base_url| {
        backend
            .with_app(mini_app("app-abc", Some("abc"), None))
            .with_app(mini_app(
                "old-app",
                None,
                Some(format!("{}/legacy/bundle.js", base_url).as_str()),
            ))
    })
    .await;

    let catalog = commands::list_catalog(&harness.state).await.unwrap();
    assert_eq!(catalog.len(), 2);
    let abc = catalog.iter().find(|entry| entry.id == "app-abc").unwrap();
    assert_eq!(abc.deployment_id, "abc");
    assert!(!abc.has_legacy_bundle);
    let old = catalog.iter().find(|entry| entry.id == "old-app").unwrap();
    assert_eq!(old.deployment_id, "old-app");
    assert!(old.has_legacy_bundle);

    let files = commands::list_deployment(&harness.state, &DeploymentId::new("abc"))
        .await
        .unwrap();
    assert_eq!(files.len(), 5);

    let missing = commands::list_deployment(&harness.state, &DeploymentId::new("missing")).await;
    assert!(matches!(missing, Err(HostError::Enumeration(_))));

    harness.cleanup().await;
}
