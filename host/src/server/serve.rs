//! Local content server
//!
//! Serves one materialized deployment directory on a random port, with the
//! bridge endpoints mounted alongside. At most one instance runs per
//! `LocalServer`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use rand::Rng;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::bridge::host::BridgeHost;
use crate::bridge::protocol::HostEvent;
use crate::errors::HostError;
use crate::filesys::dir::Dir;
use crate::server::handlers::{
    bridge_script_handler, bridge_ws_handler, health_handler, inject_shim,
    legacy_message_handler,
};
use crate::server::state::ServerState;
use crate::storage::settings::ServerSettings;

/// How long a stopping server may drain before it is aborted
pub const STOP_GRACE: Duration = Duration::from_secs(2);

/// A running server instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandle {
    pub root_directory: PathBuf,
    pub port: u16,
    pub base_url: String,
}

struct RunningServer {
    handle: ServerHandle,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<Result<(), HostError>>,
}

pub struct LocalServer {
    settings: ServerSettings,
    bridge: BridgeHost,
    events: broadcast::Sender<HostEvent>,
    running: Option<RunningServer>,
}

impl LocalServer {
    pub fn new(settings: ServerSettings, bridge: BridgeHost) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            settings,
            bridge,
            events,
            running: None,
        }
    }

    /// Start serving `root`, stopping any previous instance first.
    ///
    /// Returns the base URL.
    pub async fn start(&mut self, root: &Dir) -> Result<String, HostError> {
        self.stop().await;

        if !root.exists().await {
            return Err(HostError::ServerStart(format!(
                "root directory {} does not exist",
                root.path().display()
            )));
        }

        let listener = self.bind().await?;
        let port = listener
            .local_addr()
            .map_err(|e| HostError::ServerStart(e.to_string()))?
            .port();

        let state = Arc::new(ServerState::new(
            root.clone(),
            self.bridge.clone(),
            self.events.clone(),
        ));
        let app = router(state, root);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .map_err(|e| HostError::ServerStart(e.to_string()))
        });

        let handle = ServerHandle {
            root_directory: root.path().to_path_buf(),
            port,
            base_url: format!("http://{}:{}", self.settings.public_host, port),
        };
        info!(
            "Serving {} at {}",
            handle.root_directory.display(),
            handle.base_url
        );

        let base_url = handle.base_url.clone();
        self.running = Some(RunningServer {
            handle,
            shutdown_tx,
            task,
        });
        Ok(base_url)
    }

    async fn bind(&self) -> Result<TcpListener, HostError> {
        let attempts = self.settings.bind_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let port = rand::thread_rng().gen_range(self.settings.port_min..=self.settings.port_max);
            match TcpListener::bind((self.settings.bind_host.as_str(), port)).await {
                Ok(listener) => return Ok(listener),
                Err(e) => {
                    warn!(
                        "Bind attempt {}/{} on {}:{} failed: {}",
                        attempt, attempts, self.settings.bind_host, port, e
                    );
                    last_error = e.to_string();
                }
            }
        }

        Err(HostError::ServerStart(format!(
            "no free port in {}-{} after {} attempts: {}",
            self.settings.port_min, self.settings.port_max, attempts, last_error
        )))
    }

    /// Stop the running instance. A no-op when nothing runs.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        // Bridge connections are long-lived and would hold the graceful
        // shutdown open, so they are told to close first.
        let _ = self.events.send(HostEvent::Teardown);
        let _ = running.shutdown_tx.send(());

        let mut task = running.task;
        match tokio::time::timeout(STOP_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => debug!("Server on port {} stopped", running.handle.port),
            Ok(Ok(Err(e))) => warn!("Server on port {} exited with error: {}", running.handle.port, e),
            Ok(Err(e)) => warn!("Server task on port {} failed: {}", running.handle.port, e),
            Err(_) => {
                warn!(
                    "Server on port {} did not stop within {:?}, aborting",
                    running.handle.port, STOP_GRACE
                );
                task.abort();
            }
        }
        info!("Stopped serving {}", running.handle.root_directory.display());
    }

    /// Push a lifecycle event to every connected bridge client
    pub fn notify(&self, event: HostEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn handle(&self) -> Option<&ServerHandle> {
        self.running.as_ref().map(|r| &r.handle)
    }

    pub fn base_url(&self) -> Option<&str> {
        self.handle().map(|h| h.base_url.as_str())
    }
}

impl Drop for LocalServer {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = self.events.send(HostEvent::Teardown);
            let _ = running.shutdown_tx.send(());
            running.task.abort();
        }
    }
}

fn router(state: Arc<ServerState>, root: &Dir) -> Router {
    Router::new()
        .route("/__bridge", get(bridge_ws_handler))
        .route("/__host/message", post(legacy_message_handler))
        .route("/__host/bridge.js", get(bridge_script_handler))
        .route("/__host/health", get(health_handler))
        .with_state(state)
        .fallback_service(
            ServiceBuilder::new()
                .layer(middleware::from_fn(inject_shim))
                .service(ServeDir::new(root.path()).append_index_html_on_directories(true)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
