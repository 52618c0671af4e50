//! Host-side bridge method handlers

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::protocol::{BridgeMethod, HostInfo, LegacyMessage};
use crate::bridge::storage::NamespacedStorage;
use crate::errors::HostError;

/// Result string of `closeApp`
pub const CLOSE_REQUESTED: &str = "close_requested";

/// Content-initiated signals delivered to the session owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    CloseRequested,
    Ready,
    Log(String),
}

/// Executes bridge calls against host capabilities
pub struct HostHandlers {
    storage: NamespacedStorage,
    host_info: HostInfo,
    signals: mpsc::UnboundedSender<SessionSignal>,
}

impl HostHandlers {
    pub fn new(
        storage: NamespacedStorage,
        host_info: HostInfo,
        signals: mpsc::UnboundedSender<SessionSignal>,
    ) -> Self {
        Self {
            storage,
            host_info,
            signals,
        }
    }

    fn signal(&self, signal: SessionSignal) {
        if self.signals.send(signal).is_err() {
            debug!("Session signal dropped, no session is listening");
        }
    }

    /// Run one call and produce its JSON result
    pub async fn handle(&self, method: BridgeMethod) -> Result<Value, HostError> {
        let result = match method {
            BridgeMethod::GetLocalStorageItem { key } => match self.storage.get_item(&key).await {
                Ok(Some(value)) => Value::String(value),
                Ok(None) => Value::Null,
                Err(e) => {
                    warn!("Failed to read mini-app storage key {}: {}", key, e);
                    Value::Null
                }
            },
            BridgeMethod::SetLocalStorageItem { key, value } => {
                stored(self.storage.set_item(&key, &value).await, "write", &key)
            }
            BridgeMethod::RemoveLocalStorageItem { key } => {
                stored(self.storage.remove_item(&key).await, "remove", &key)
            }
            BridgeMethod::ClearLocalStorage => match self.storage.clear().await {
                Ok(removed) => {
                    debug!("Cleared {} mini-app storage keys", removed);
                    Value::Bool(true)
                }
                Err(e) => {
                    warn!("Failed to clear mini-app storage: {}", e);
                    Value::Bool(false)
                }
            },
            BridgeMethod::CloseApp => {
                info!("Mini-app requested close");
                self.signal(SessionSignal::CloseRequested);
                Value::String(CLOSE_REQUESTED.to_string())
            }
            BridgeMethod::LogMessage { text } => {
                info!("[mini-app] {}", text);
                Value::Bool(true)
            }
            BridgeMethod::GetHostInfo => json!(self.host_info),
        };
        Ok(result)
    }

    /// Apply a legacy one-way message; unknown kinds are ignored
    pub fn handle_legacy(&self, message: Option<LegacyMessage>) {
        match message {
            Some(LegacyMessage::Close) => {
                info!("Mini-app requested close (legacy)");
                self.signal(SessionSignal::CloseRequested);
            }
            Some(LegacyMessage::Ready) => {
                info!("Mini-app ready");
                self.signal(SessionSignal::Ready);
            }
            Some(LegacyMessage::Log(text)) => {
                info!("[mini-app] {}", text);
                self.signal(SessionSignal::Log(text));
            }
            None => warn!("Ignoring legacy message of unknown type"),
        }
    }
}

/// Storage writes answer `false` instead of failing the call
fn stored(result: Result<(), HostError>, action: &str, key: &str) -> Value {
    match result {
        Ok(()) => Value::Bool(true),
        Err(e) => {
            warn!("Failed to {} mini-app storage key {}: {}", action, key, e);
            Value::Bool(false)
        }
    }
}
