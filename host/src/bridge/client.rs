//! Content side of the bridge
//!
//! Issues calls with fresh correlation ids and resolves each pending call
//! at most once. Used by automation and tests in place of the JavaScript
//! shim.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, warn};

use crate::bridge::protocol::{
    parse_outbound, BridgeMethod, BridgeRequest, HostEvent, HostInfo, OutboundFrame,
};
use crate::errors::HostError;
use crate::utils::generate_uuid;

type Resolver = oneshot::Sender<Result<Value, String>>;
type PendingCalls = Arc<Mutex<HashMap<String, Resolver>>>;
/// Resolvers of abandoned calls, held so their callers never complete.
/// Grows with every abandoned call and is freed only when the client is
/// dropped.
type AbandonedCalls = Arc<Mutex<Vec<Resolver>>>;

pub struct BridgeClient {
    outbound: mpsc::UnboundedSender<String>,
    pending: PendingCalls,
    abandoned: AbandonedCalls,
    events: broadcast::Sender<HostEvent>,
    reader: JoinHandle<()>,
}

impl BridgeClient {
    /// Client over raw frame channels
    pub fn from_channels(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        let pending = PendingCalls::default();
        let abandoned = AbandonedCalls::default();
        let (events, _) = broadcast::channel(16);

        let reader = tokio::spawn(read_loop(
            inbound,
            pending.clone(),
            abandoned.clone(),
            events.clone(),
        ));

        Self {
            outbound,
            pending,
            abandoned,
            events,
            reader,
        }
    }

    /// Connect to a host's `/__bridge` WebSocket endpoint
    pub async fn connect(ws_url: &str) -> Result<Self, HostError> {
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| HostError::Session(format!("bridge connection failed: {}", e)))?;
        let (mut sink, mut stream) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text.as_str().to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        debug!("Bridge client connected to {}", ws_url);
        Ok(Self::from_channels(outbound_tx, inbound_rx))
    }

    /// Issue one call and wait for its response.
    ///
    /// There is no timeout; an abandoned call never completes.
    pub async fn call(&self, method: BridgeMethod) -> Result<Value, HostError> {
        let id = generate_uuid();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id.clone(), tx);

        let request = BridgeRequest {
            id: id.clone(),
            method,
        };
        if self.outbound.send(request.to_frame()).is_err() {
            lock(&self.pending).remove(&id);
            return Err(HostError::Session("bridge transport is closed".to_string()));
        }

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(HostError::Session(message)),
            Err(_) => Err(HostError::Session("bridge client dropped".to_string())),
        }
    }

    /// Leave every pending call unresolved; returns how many there were
    pub fn abandon_all(&self) -> usize {
        abandon(&self.pending, &self.abandoned)
    }

    /// Calls abandoned so far over this client's lifetime
    pub fn abandoned_calls(&self) -> usize {
        lock(&self.abandoned).len()
    }

    /// Calls still waiting for a response
    pub fn pending_calls(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Host lifecycle events
    pub fn events(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    pub async fn get_item(&self, key: &str) -> Result<Option<String>, HostError> {
        let value = self
            .call(BridgeMethod::GetLocalStorageItem { key: key.to_string() })
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn set_item(&self, key: &str, value: &str) -> Result<bool, HostError> {
        let result = self
            .call(BridgeMethod::SetLocalStorageItem {
                key: key.to_string(),
                value: value.to_string(),
            })
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub async fn remove_item(&self, key: &str) -> Result<bool, HostError> {
        let result = self
            .call(BridgeMethod::RemoveLocalStorageItem { key: key.to_string() })
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub async fn clear_storage(&self) -> Result<bool, HostError> {
        let result = self.call(BridgeMethod::ClearLocalStorage).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub async fn close_app(&self) -> Result<String, HostError> {
        let result = self.call(BridgeMethod::CloseApp).await?;
        Ok(result.as_str().unwrap_or_default().to_string())
    }

    pub async fn log_message(&self, text: &str) -> Result<bool, HostError> {
        let result = self
            .call(BridgeMethod::LogMessage { text: text.to_string() })
            .await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub async fn host_info(&self) -> Result<HostInfo, HostError> {
        let result = self.call(BridgeMethod::GetHostInfo).await?;
        Ok(serde_json::from_value(result)?)
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn abandon(pending: &PendingCalls, abandoned: &AbandonedCalls) -> usize {
    let drained: Vec<Resolver> = lock(pending).drain().map(|(_, resolver)| resolver).collect();
    let count = drained.len();
    lock(abandoned).extend(drained);
    count
}

async fn read_loop(
    mut inbound: mpsc::UnboundedReceiver<String>,
    pending: PendingCalls,
    abandoned: AbandonedCalls,
    events: broadcast::Sender<HostEvent>,
) {
    while let Some(raw) = inbound.recv().await {
        match parse_outbound(&raw) {
            Ok(OutboundFrame::Response(response)) => {
                let resolver = lock(&pending).remove(&response.id);
                match resolver {
                    Some(resolver) => {
                        let _ = resolver.send(response.into_result());
                    }
                    None => warn!(
                        "Protocol anomaly: response for unknown or settled call {}",
                        response.id
                    ),
                }
            }
            Ok(OutboundFrame::Event(event)) => {
                if event == HostEvent::Teardown {
                    let count = abandon(&pending, &abandoned);
                    debug!("Host teardown, {} calls left unresolved", count);
                }
                let _ = events.send(event);
            }
            Err(e) => warn!("Dropping bridge frame: {}", e),
        }
    }

    let count = abandon(&pending, &abandoned);
    debug!("Bridge transport closed, {} calls left unresolved", count);
}
