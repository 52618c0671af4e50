//! Local host server tests

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use minihost::bridge::host::BridgeHost;
use minihost::bridge::methods::{HostHandlers, SessionSignal};
use minihost::bridge::protocol::HostInfo;
use minihost::bridge::storage::NamespacedStorage;
use minihost::errors::HostError;
use minihost::filesys::dir::Dir;
use minihost::server::handlers::{with_shim, SHIM_TAG};
use minihost::server::serve::LocalServer;
use minihost::storage::kv::MemoryKvStore;
use minihost::storage::settings::ServerSettings;

use crate::fixtures::write_fixture;

fn local_settings() -> ServerSettings {
    ServerSettings {
        bind_host: "127.0.0.1".to_string(),
        ..Default::default()
    }
}

fn local_server(settings: ServerSettings) -> (LocalServer, mpsc::UnboundedReceiver<SessionSignal>) {
    let (signals_tx, signals_rx) = mpsc::unbounded_channel();
    let handlers = HostHandlers::new(
        NamespacedStorage::new(Arc::new(MemoryKvStore::new())),
        HostInfo::default(),
        signals_tx,
    );
    (
        LocalServer::new(settings, BridgeHost::new(Arc::new(handlers))),
        signals_rx,
    )
}

async fn site(index: &str) -> Dir {
    let dir = Dir::create_temp_dir("minihost-site").await.unwrap();
    write_fixture(&dir, "index.html", index).await;
    write_fixture(&dir, "assets/app.js", "console.log(1)").await;
    dir
}

#[tokio::test]
async fn test_serves_root_directory() {
    let root = site("<p>one</p>").await;
    let (mut server, _signals) = local_server(local_settings());

    let base_url = server.start(&root).await.unwrap();
    assert!(base_url.starts_with("http://127.0.0.1:"));
    assert!(server.is_running());

    let handle = server.handle().unwrap();
    assert_eq!(handle.root_directory, root.path());
    assert!((3000..=9000).contains(&handle.port));

    let index = reqwest::get(format!("{}/index.html", base_url)).await.unwrap();
    assert_eq!(index.text().await.unwrap(), with_shim("<p>one</p>"));

    let directory = reqwest::get(format!("{}/", base_url)).await.unwrap();
    assert_eq!(directory.text().await.unwrap(), with_shim("<p>one</p>"));

    let asset = reqwest::get(format!("{}/assets/app.js", base_url)).await.unwrap();
    assert!(asset.status().is_success());

    let missing = reqwest::get(format!("{}/nope.css", base_url)).await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    server.stop().await;
    root.delete().await.unwrap();
}

#[tokio::test]
async fn test_host_endpoints() {
    let root = site("<p>one</p>").await;
    let (mut server, _signals) = local_server(local_settings());
    let base_url = server.start(&root).await.unwrap();

    let health: serde_json::Value = reqwest::get(format!("{}/__host/health", base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "minihost");

    let shim = reqwest::get(format!("{}/__host/bridge.js", base_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(shim.contains("MiniAppHost"));
    for prefix in ["LOG: ", "ERROR: ", "WARN: "] {
        assert!(shim.contains(prefix));
    }
    assert!(shim.contains(r#"addEventListener("load""#));

    server.stop().await;
    root.delete().await.unwrap();
}

#[tokio::test]
async fn test_html_pages_get_the_shim() {
    let root = site("<html><head><title>t</title></head><body>app</body></html>").await;
    write_fixture(&root, "docs/guide.html", "<p>guide</p>").await;
    let (mut server, _signals) = local_server(local_settings());
    let base_url = server.start(&root).await.unwrap();

    let index = reqwest::get(format!("{}/index.html", base_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(
        index,
        format!("<html><head><title>t</title>{}</head><body>app</body></html>", SHIM_TAG)
    );

    let guide = reqwest::get(format!("{}/docs/guide.html", base_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(guide, format!("{}<p>guide</p>", SHIM_TAG));

    let script = reqwest::get(format!("{}/assets/app.js", base_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(script, "console.log(1)");

    server.stop().await;
    root.delete().await.unwrap();
}

#[tokio::test]
async fn test_legacy_message_endpoint() {
    let root = site("<p>one</p>").await;
    let (mut server, mut signals) = local_server(local_settings());
    let base_url = server.start(&root).await.unwrap();
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/__host/message", base_url))
        .body(r#"{"type":"CLOSE"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    assert_eq!(signals.recv().await, Some(SessionSignal::CloseRequested));

    // Unknown kinds are accepted and ignored
    let response = client
        .post(format!("{}/__host/message", base_url))
        .body(r#"{"type":"RESIZE"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

    let response = client
        .post(format!("{}/__host/message", base_url))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(signals.try_recv().is_err());

    server.stop().await;
    root.delete().await.unwrap();
}

#[tokio::test]
async fn test_double_start_leaves_one_server() {
    let first_root = site("<p>one</p>").await;
    let second_root = site("<p>two</p>").await;
    let (mut server, _signals) = local_server(local_settings());

    let first_url = server.start(&first_root).await.unwrap();
    let first_port = server.handle().unwrap().port;
    let second_url = server.start(&second_root).await.unwrap();
    let second_port = server.handle().unwrap().port;

    assert_eq!(server.handle().unwrap().root_directory, second_root.path());
    let body = reqwest::get(format!("{}/index.html", second_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, with_shim("<p>two</p>"));

    if first_port != second_port {
        assert!(reqwest::get(format!("{}/index.html", first_url)).await.is_err());
    }

    server.stop().await;
    first_root.delete().await.unwrap();
    second_root.delete().await.unwrap();
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let root = site("<p>one</p>").await;
    let (mut server, _signals) = local_server(local_settings());

    // Stopping a server that never started
    server.stop().await;

    let base_url = server.start(&root).await.unwrap();
    server.stop().await;
    server.stop().await;

    assert!(!server.is_running());
    assert!(server.base_url().is_none());
    assert!(reqwest::get(format!("{}/index.html", base_url)).await.is_err());

    root.delete().await.unwrap();
}

#[tokio::test]
async fn test_missing_root_fails() {
    let (mut server, _signals) = local_server(local_settings());
    let root = Dir::new(std::env::temp_dir().join(format!("minihost-none-{}", uuid::Uuid::new_v4())));

    let result = server.start(&root).await;
    assert!(matches!(result, Err(HostError::ServerStart(_))));
    assert!(!server.is_running());
}

#[tokio::test]
async fn test_no_free_port() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();
    let settings = ServerSettings {
        port_min: port,
        port_max: port,
        bind_attempts: 2,
        ..local_settings()
    };
    let (mut server, _signals) = local_server(settings);
    let root = site("<p>one</p>").await;

    let result = server.start(&root).await;
    assert!(matches!(result, Err(HostError::ServerStart(_))));

    root.delete().await.unwrap();
}
