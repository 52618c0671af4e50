//! Local materializer tests

use std::sync::Arc;

use minihost::backend::memory::MemoryBackend;
use minihost::cache::Caches;
use minihost::deploy::classifier::Platform;
use minihost::deploy::lister::StorageLister;
use minihost::deploy::materializer::{MaterializeSource, Materializer, ENTRY_DOCUMENT};
use minihost::errors::HostError;
use minihost::filesys::dir::Dir;
use minihost::http::client::HttpClient;
use minihost::models::deployment::{DeploymentId, FileEntry};
use minihost::storage::layout::StorageLayout;
use minihost::storage::settings::ListerSettings;

use crate::fixtures::{abc_store, serve_dir, FileServer, ABC_INDEX};

struct Setup {
    store: Dir,
    home: Dir,
    server: FileServer,
    files: Vec<FileEntry>,
    caches: Caches,
    materializer: Materializer,
}

async fn setup() -> Setup {
    let store = abc_store().await;
    let server = serve_dir(&store).await;
    let backend = Arc::new(MemoryBackend::from_dir(&store, &server.base_url).await.unwrap());
    let files = StorageLister::new(backend, &ListerSettings::default())
        .try_list_deployment_files(&DeploymentId::new("abc"))
        .await
        .unwrap();

    let home = Dir::create_temp_dir("minihost-home").await.unwrap();
    let caches = Caches::default();
    let materializer = Materializer::new(
        Arc::new(HttpClient::new(&server.base_url).unwrap()),
        StorageLayout::new(home.path()),
        caches.clone(),
    );

    Setup {
        store,
        home,
        server,
        files,
        caches,
        materializer,
    }
}

impl Setup {
    async fn cleanup(self) {
        self.store.delete().await.unwrap();
        self.home.delete().await.unwrap();
    }
}

fn missing_file(server: &FileServer, path: &str) -> FileEntry {
    FileEntry {
        original_path: path.to_string(),
        file_id: path.to_string(),
        file_name: path.rsplit('/').next().unwrap_or(path).to_string(),
        public_url: format!("{}/deployments/abc/{}", server.base_url, path),
        upload_path: format!("deployments/abc/{}", path),
        file_size: 0,
        file_type: "text/css".to_string(),
    }
}

#[tokio::test]
async fn test_materialize_preserves_layout() {
    let setup = setup().await;
    let id = DeploymentId::new("abc");

    let report = setup
        .materializer
        .materialize(&id, MaterializeSource::Files(&setup.files))
        .await
        .unwrap();

    assert_eq!(report.written, 5);
    assert!(report.failed.is_empty());
    assert_eq!(report.root, setup.materializer.root_for(&id));
    assert_eq!(
        report.root.file(ENTRY_DOCUMENT).read_string().await.unwrap(),
        ABC_INDEX
    );
    assert_eq!(
        report
            .root
            .resolve_relative("_expo/static/js/ios/index.hbc")
            .unwrap()
            .read_string()
            .await
            .unwrap(),
        "ios-bundle"
    );

    // Materializing again overwrites in place
    let again = setup
        .materializer
        .materialize(&id, MaterializeSource::Files(&setup.files))
        .await
        .unwrap();
    assert_eq!(again.written, 5);

    setup.cleanup().await;
}

#[tokio::test]
async fn test_partial_failure_is_reported() {
    let setup = setup().await;
    let mut files = setup.files.clone();
    files.push(missing_file(&setup.server, "styles/missing.css"));

    let report = setup
        .materializer
        .materialize(&DeploymentId::new("abc"), MaterializeSource::Files(&files))
        .await
        .unwrap();

    assert_eq!(report.written, 5);
    assert_eq!(report.failed, vec!["styles/missing.css".to_string()]);
    assert_eq!(report.attempted(), 6);

    setup.cleanup().await;
}

#[tokio::test]
async fn test_total_failure_is_an_error() {
    let setup = setup().await;
    let files = vec![
        missing_file(&setup.server, "a.js"),
        missing_file(&setup.server, "b.css"),
    ];

    let result = setup
        .materializer
        .materialize(&DeploymentId::new("abc"), MaterializeSource::Files(&files))
        .await;
    assert!(matches!(result, Err(HostError::Materialization(_))));

    setup.cleanup().await;
}

#[tokio::test]
async fn test_unsafe_paths_are_not_written() {
    let setup = setup().await;
    let mut files = setup.files.clone();
    let mut escaping = files[0].clone();
    escaping.original_path = "../escape.html".to_string();
    files.push(escaping);

    let report = setup
        .materializer
        .materialize(&DeploymentId::new("abc"), MaterializeSource::Files(&files))
        .await
        .unwrap();

    assert_eq!(report.failed, vec!["../escape.html".to_string()]);
    assert!(!setup.home.file("mini-apps/escape.html").exists().await);

    setup.cleanup().await;
}

#[tokio::test]
async fn test_materialize_literal() {
    let setup = setup().await;
    let id = DeploymentId::new("preview");

    let report = setup
        .materializer
        .materialize(&id, MaterializeSource::Literal("<h1>hi</h1>"))
        .await
        .unwrap();

    assert_eq!(report.written, 1);
    assert_eq!(
        report.root.file(ENTRY_DOCUMENT).read_string().await.unwrap(),
        "<h1>hi</h1>"
    );

    setup.cleanup().await;
}

#[tokio::test]
async fn test_invalid_deployment_id() {
    let setup = setup().await;
    let result = setup
        .materializer
        .materialize(&DeploymentId::new(".."), MaterializeSource::Literal("x"))
        .await;
    assert!(matches!(result, Err(HostError::Materialization(_))));

    setup.cleanup().await;
}

#[tokio::test]
async fn test_platform_bundle_is_cached() {
    let setup = setup().await;
    let id = DeploymentId::new("abc");

    let path = setup
        .materializer
        .download_platform_bundle(&id, &setup.files, Platform::Android)
        .await
        .unwrap();
    assert!(path.ends_with("bundles/abc/index.hbc"));
    assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "android-bundle");
    assert_eq!(setup.materializer.cached_bundles(), vec![id.clone()]);

    // A cache hit does not need the file list
    let cached = setup
        .materializer
        .download_platform_bundle(&id, &[], Platform::Android)
        .await
        .unwrap();
    assert_eq!(cached, path);

    // A vanished file is downloaded again
    tokio::fs::remove_file(&path).await.unwrap();
    let result = setup
        .materializer
        .download_platform_bundle(&id, &[], Platform::Android)
        .await;
    assert!(matches!(result, Err(HostError::BundleNotFound(_))));
    assert!(setup.caches.bundles.is_empty());

    setup.cleanup().await;
}

#[tokio::test]
async fn test_missing_platform_bundle() {
    let setup = setup().await;
    let result = setup
        .materializer
        .download_platform_bundle(&DeploymentId::new("abc"), &setup.files, Platform::Web)
        .await;
    assert!(matches!(result, Err(HostError::BundleNotFound(_))));

    setup.cleanup().await;
}

#[tokio::test]
async fn test_clear_cache() {
    let setup = setup().await;
    let id = DeploymentId::new("abc");
    let layout = StorageLayout::new(setup.home.path());

    setup
        .materializer
        .materialize(&id, MaterializeSource::Files(&setup.files))
        .await
        .unwrap();
    setup
        .materializer
        .download_platform_bundle(&id, &setup.files, Platform::Ios)
        .await
        .unwrap();

    setup.materializer.clear_cache().await.unwrap();

    assert!(!layout.mini_apps_dir().exists().await);
    assert!(!layout.bundles_dir().exists().await);
    assert!(setup.materializer.cached_bundles().is_empty());

    // Clearing twice is fine
    setup.materializer.clear_cache().await.unwrap();
    setup.cleanup().await;
}
