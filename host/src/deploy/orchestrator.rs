//! Deployment orchestration
//!
//! A `ViewerSession` drives one viewing session through
//! `Idle -> Listing -> Materializing -> Starting -> Ready`, owns the local
//! server and keeps the inputs needed to replay a failed attempt.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::backend::AppCatalog;
use crate::bridge::host::BridgeHost;
use crate::bridge::methods::{HostHandlers, SessionSignal};
use crate::bridge::protocol::{HostEvent, HostInfo};
use crate::bridge::storage::NamespacedStorage;
use crate::deploy::fsm::{SessionEvent, SessionFsm, SessionState};
use crate::deploy::lister::StorageLister;
use crate::deploy::manifest::MetadataLoader;
use crate::deploy::materializer::{MaterializeSource, Materializer, ENTRY_DOCUMENT};
use crate::deploy::resolver::{resolve_app_files, LegacyFallback};
use crate::errors::HostError;
use crate::models::app::MiniApp;
use crate::models::deployment::{DeploymentId, DeploymentManifest, FileEntry};
use crate::server::serve::LocalServer;
use crate::storage::kv::KeyValueStore;
use crate::storage::settings::ServerSettings;

/// What a session shows
#[derive(Debug, Clone)]
pub enum SessionSource {
    /// Literal entry document; no remote files
    Literal {
        deployment_id: DeploymentId,
        content: String,
    },
    /// An already listed file set
    Files {
        deployment_id: DeploymentId,
        files: Vec<FileEntry>,
    },
    /// A deployment listed from the store
    Deployment(DeploymentId),
    /// A catalog record
    App(MiniApp),
    /// A catalog record looked up by id
    AppId(String),
}

impl SessionSource {
    pub fn is_literal(&self) -> bool {
        matches!(self, SessionSource::Literal { .. })
    }
}

/// Inputs of the last attempt, kept for replay
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub deployment_id: Option<DeploymentId>,
    pub files: Vec<FileEntry>,
    pub literal: Option<String>,
}

/// A ready session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub deployment_id: DeploymentId,
    pub base_url: String,
    pub entry_url: String,
    pub bridge_url: String,
    pub root: PathBuf,
    pub metadata: Option<DeploymentManifest>,
    pub files_written: usize,
    pub files_failed: Vec<String>,
}

/// Orchestrator settings
#[derive(Debug, Clone, Default)]
pub struct OrchestratorSettings {
    pub server: ServerSettings,
    pub legacy_fallback: LegacyFallback,
    pub host_info: HostInfo,
}

/// Shared collaborators of every session
pub struct Orchestrator {
    catalog: Arc<dyn AppCatalog>,
    lister: Arc<StorageLister>,
    materializer: Arc<Materializer>,
    metadata: Arc<MetadataLoader>,
    kv_store: Arc<dyn KeyValueStore>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<dyn AppCatalog>,
        lister: Arc<StorageLister>,
        materializer: Arc<Materializer>,
        metadata: Arc<MetadataLoader>,
        kv_store: Arc<dyn KeyValueStore>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            catalog,
            lister,
            materializer,
            metadata,
            kv_store,
            settings,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn AppCatalog> {
        &self.catalog
    }

    /// Open an idle session for `source`
    pub fn open_session(self: &Arc<Self>, source: SessionSource) -> ViewerSession {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let handlers = HostHandlers::new(
            NamespacedStorage::new(self.kv_store.clone()),
            self.settings.host_info.clone(),
            signals_tx,
        );
        let server = LocalServer::new(
            self.settings.server.clone(),
            BridgeHost::new(Arc::new(handlers)),
        );

        ViewerSession {
            orchestrator: self.clone(),
            source,
            fsm: SessionFsm::new(),
            context: SessionContext::default(),
            server,
            signals: signals_rx,
            info: None,
            user_error: None,
        }
    }
}

pub struct ViewerSession {
    orchestrator: Arc<Orchestrator>,
    source: SessionSource,
    fsm: SessionFsm,
    context: SessionContext,
    server: LocalServer,
    signals: mpsc::UnboundedReceiver<SessionSignal>,
    info: Option<SessionInfo>,
    user_error: Option<String>,
}

impl ViewerSession {
    pub fn state(&self) -> SessionState {
        self.fsm.state()
    }

    pub fn fsm(&self) -> &SessionFsm {
        &self.fsm
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn info(&self) -> Option<&SessionInfo> {
        self.info.as_ref()
    }

    /// Short message for the user after a failure
    pub fn error_message(&self) -> Option<&str> {
        self.user_error.as_deref()
    }

    pub fn server(&self) -> &LocalServer {
        &self.server
    }

    /// Run the pipeline from `Idle`
    pub async fn start(&mut self) -> Result<SessionInfo, HostError> {
        let literal = self.source.is_literal();
        self.transition(SessionEvent::Begin { literal })?;
        self.drive().await
    }

    /// Replay the pipeline from the top after a failure
    pub async fn retry(&mut self) -> Result<SessionInfo, HostError> {
        let literal = self.source.is_literal();
        self.transition(SessionEvent::Retry { literal })?;
        info!("Retrying session (attempt {})", self.fsm.retry_count() + 1);
        self.drive().await
    }

    /// Host-initiated restart: tell content, tear down and start again
    pub async fn restart(&mut self) -> Result<SessionInfo, HostError> {
        self.server.notify(HostEvent::Restart);
        self.teardown().await;
        self.start().await
    }

    /// Stop the server and abandon every pending bridge call
    pub async fn teardown(&mut self) {
        self.server.stop().await;
        if let Err(e) = self.fsm.process(SessionEvent::Teardown) {
            error!("Teardown rejected: {}", e);
        }
        self.info = None;
    }

    /// Next content-initiated signal
    pub async fn next_signal(&mut self) -> Option<SessionSignal> {
        self.signals.recv().await
    }

    fn transition(&mut self, event: SessionEvent) -> Result<(), HostError> {
        self.fsm.process(event).map_err(HostError::Session)
    }

    async fn drive(&mut self) -> Result<SessionInfo, HostError> {
        match self.run_pipeline().await {
            Ok(info) => {
                self.user_error = None;
                self.info = Some(info.clone());
                Ok(info)
            }
            Err(e) => {
                error!("Session failed while {:?}: {}", self.fsm.state(), e);
                self.server.stop().await;
                self.user_error = Some(e.user_message().to_string());
                if let Err(transition) = self.fsm.process(SessionEvent::Failed(e.to_string())) {
                    error!("{}", transition);
                }
                Err(e)
            }
        }
    }

    async fn run_pipeline(&mut self) -> Result<SessionInfo, HostError> {
        let orchestrator = self.orchestrator.clone();

        if self.fsm.state() == SessionState::Listing {
            let (deployment_id, files) = self.resolve(&orchestrator).await?;
            self.context = SessionContext {
                deployment_id: Some(deployment_id),
                files,
                literal: None,
            };
            self.transition(SessionEvent::Listed)?;
        } else if let SessionSource::Literal {
            deployment_id,
            content,
        } = &self.source
        {
            self.context = SessionContext {
                deployment_id: Some(deployment_id.clone()),
                files: Vec::new(),
                literal: Some(content.clone()),
            };
        }

        let deployment_id = self
            .context
            .deployment_id
            .clone()
            .ok_or_else(|| HostError::Session("no deployment resolved".to_string()))?;
        let context = &self.context;
        let source = match &context.literal {
            Some(content) => MaterializeSource::Literal(content),
            None => MaterializeSource::Files(&context.files),
        };

        // Metadata is optional and loads alongside the downloads
        let (report, metadata) = tokio::join!(
            orchestrator.materializer.materialize(&deployment_id, source),
            async {
                if context.literal.is_some() {
                    None
                } else {
                    orchestrator
                        .metadata
                        .load_metadata(&deployment_id, &context.files)
                        .await
                }
            }
        );
        let report = report?;
        self.transition(SessionEvent::Materialized)?;

        let base_url = self.server.start(&report.root).await?;
        self.transition(SessionEvent::Started)?;

        let entry_url = if report.root.file(ENTRY_DOCUMENT).exists().await {
            format!("{}/{}", base_url, ENTRY_DOCUMENT)
        } else if let [only] = self.context.files.as_slice() {
            format!("{}/{}", base_url, only.original_path)
        } else {
            format!("{}/", base_url)
        };

        info!("Deployment {} ready at {}", deployment_id, entry_url);
        Ok(SessionInfo {
            bridge_url: format!("{}/__bridge", base_url.replacen("http", "ws", 1)),
            deployment_id,
            base_url,
            entry_url,
            root: report.root.path().to_path_buf(),
            metadata,
            files_written: report.written,
            files_failed: report.failed,
        })
    }

    async fn resolve(
        &self,
        orchestrator: &Orchestrator,
    ) -> Result<(DeploymentId, Vec<FileEntry>), HostError> {
        let app = match &self.source {
            SessionSource::Files {
                deployment_id,
                files,
            } => {
                if files.is_empty() {
                    return Err(HostError::Enumeration(format!(
                        "no files given for deployment {}",
                        deployment_id
                    )));
                }
                return Ok((deployment_id.clone(), files.clone()));
            }
            SessionSource::Deployment(deployment_id) => {
                let files = orchestrator
                    .lister
                    .try_list_deployment_files(deployment_id)
                    .await?;
                return Ok((deployment_id.clone(), files));
            }
            SessionSource::Literal { deployment_id, .. } => {
                return Ok((deployment_id.clone(), Vec::new()));
            }
            SessionSource::App(app) => app.clone(),
            SessionSource::AppId(id) => orchestrator.catalog.get_app(id).await?,
        };

        let policy = orchestrator.settings.legacy_fallback;
        let listed = if policy.skips_listing(&app) {
            Vec::new()
        } else {
            orchestrator
                .lister
                .list_deployment_files(&app.effective_deployment_id())
                .await
        };

        let resolved = resolve_app_files(&app, listed, policy)?;
        Ok((resolved.deployment_id, resolved.files))
    }
}
