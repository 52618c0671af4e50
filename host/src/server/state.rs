//! Server state

use tokio::sync::broadcast;

use crate::bridge::host::BridgeHost;
use crate::bridge::protocol::HostEvent;
use crate::filesys::dir::Dir;

/// Server state shared across handlers
pub struct ServerState {
    pub root: Dir,
    pub bridge: BridgeHost,
    pub events: broadcast::Sender<HostEvent>,
}

impl ServerState {
    pub fn new(root: Dir, bridge: BridgeHost, events: broadcast::Sender<HostEvent>) -> Self {
        Self {
            root,
            bridge,
            events,
        }
    }
}
