//! Host side of one bridge connection
//!
//! Calls are multiplexed: each request runs as its own task and its
//! response is written whenever it completes. Teardown aborts whatever is
//! still running; those calls never get a response.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::bridge::methods::HostHandlers;
use crate::bridge::protocol::{parse_inbound, BridgeRequest, BridgeResponse, HostEvent, InboundFrame};

/// Why a connection loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// Content closed the transport
    Closed,
    /// The host tore the session down
    TornDown,
}

#[derive(Clone)]
pub struct BridgeHost {
    handlers: Arc<HostHandlers>,
}

impl BridgeHost {
    pub fn new(handlers: Arc<HostHandlers>) -> Self {
        Self { handlers }
    }

    pub fn handlers(&self) -> &Arc<HostHandlers> {
        &self.handlers
    }

    /// Serve one connection until content disconnects or the host tears
    /// the session down
    pub async fn serve<S>(
        &self,
        mut inbound: S,
        outbound: mpsc::UnboundedSender<String>,
        mut events: broadcast::Receiver<HostEvent>,
    ) -> ConnectionEnd
    where
        S: Stream<Item = String> + Unpin,
    {
        let in_flight: Arc<Mutex<HashSet<String>>> = Arc::default();
        let mut calls = JoinSet::new();

        let end = loop {
            tokio::select! {
                frame = inbound.next() => match frame {
                    Some(raw) => self.accept(&raw, &outbound, &in_flight, &mut calls),
                    None => break ConnectionEnd::Closed,
                },
                event = events.recv() => match event {
                    Ok(event) => {
                        let _ = outbound.send(event.to_frame());
                        if event == HostEvent::Teardown {
                            break ConnectionEnd::TornDown;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Bridge connection missed {} host events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break ConnectionEnd::TornDown,
                },
                Some(_) = calls.join_next(), if !calls.is_empty() => {}
            }
        };

        if !calls.is_empty() {
            debug!("Abandoning {} in-flight bridge calls", calls.len());
        }
        calls.abort_all();
        end
    }

    fn accept(
        &self,
        raw: &str,
        outbound: &mpsc::UnboundedSender<String>,
        in_flight: &Arc<Mutex<HashSet<String>>>,
        calls: &mut JoinSet<()>,
    ) {
        let request = match parse_inbound(raw) {
            Ok(InboundFrame::Request(request)) => request,
            Ok(InboundFrame::Legacy(message)) => {
                self.handlers.handle_legacy(message);
                return;
            }
            Ok(InboundFrame::Rejected { id, reason }) => {
                warn!("Rejecting bridge call {}: {}", id, reason);
                let _ = outbound.send(BridgeResponse::err(id, reason).to_frame());
                return;
            }
            Err(e) => {
                warn!("Dropping bridge frame: {}", e);
                return;
            }
        };

        let BridgeRequest { id, method } = request;
        let fresh = in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone());
        if !fresh {
            warn!("Protocol anomaly: call id {} is already in flight", id);
            return;
        }

        let handlers = self.handlers.clone();
        let outbound = outbound.clone();
        let in_flight = in_flight.clone();
        calls.spawn(async move {
            let name = method.name();
            let response = match handlers.handle(method).await {
                Ok(result) => BridgeResponse::ok(id.clone(), result),
                Err(e) => {
                    warn!("Bridge call {} ({}) failed: {}", id, name, e);
                    BridgeResponse::err(id.clone(), e.to_string())
                }
            };
            in_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
            let _ = outbound.send(response.to_frame());
        });
    }
}

/// Adapt a channel receiver into the frame stream `serve` consumes
pub fn receiver_stream(
    receiver: mpsc::UnboundedReceiver<String>,
) -> impl Stream<Item = String> + Send + Unpin {
    Box::pin(futures::stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|frame| (frame, receiver))
    }))
}
