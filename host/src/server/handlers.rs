//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bridge::protocol::LegacyMessage;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Content shim served at `/__host/bridge.js`
pub const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

/// Script tag added to every HTML page served from a deployment
pub const SHIM_TAG: &str = r#"<script src="/__host/bridge.js"></script>"#;

/// Pages larger than this are served untouched
const MAX_INJECTED_PAGE: usize = 8 * 1024 * 1024;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub root: String,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "minihost".to_string(),
        version: version.version,
        root: state.root.path().display().to_string(),
    })
}

/// Bridge shim handler
pub async fn bridge_script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        BRIDGE_SCRIPT,
    )
}

/// Add the shim tag to full HTML responses of the deployment root
pub async fn inject_shim(request: Request, next: Next) -> Response {
    let is_head = request.method() == Method::HEAD;
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"));
    let too_large = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok())
        .is_some_and(|length| length > MAX_INJECTED_PAGE);
    if is_head || !is_html || too_large || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_INJECTED_PAGE).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read page for shim injection: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let page = with_shim(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::ETAG);
    Response::from_parts(parts, Body::from(page))
}

/// `page` with the shim tag at the end of `<head>`, else right after the
/// opening `<body>` tag, else at the very start
pub fn with_shim(page: &str) -> String {
    if page.contains(SHIM_TAG) {
        return page.to_string();
    }

    // ASCII lowercasing keeps byte offsets valid for `page`
    let lower = page.to_ascii_lowercase();
    let at = lower.find("</head>").or_else(|| {
        let body = lower.find("<body")?;
        lower[body..].find('>').map(|end| body + end + 1)
    });

    match at {
        Some(at) => format!("{}{}{}", &page[..at], SHIM_TAG, &page[at..]),
        None => format!("{}{}", SHIM_TAG, page),
    }
}

/// Legacy one-way message handler
pub async fn legacy_message_handler(
    State(state): State<Arc<ServerState>>,
    body: String,
) -> StatusCode {
    match LegacyMessage::parse(&body) {
        Ok(message) => {
            state.bridge.handlers().handle_legacy(message);
            StatusCode::NO_CONTENT
        }
        Err(e) => {
            warn!("Dropping legacy message: {}", e);
            StatusCode::BAD_REQUEST
        }
    }
}

/// Bridge WebSocket upgrade handler
pub async fn bridge_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_bridge_socket(socket, state))
}

async fn serve_bridge_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sink, stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let inbound = stream
        .take_while(|message| futures::future::ready(!matches!(message, Err(_) | Ok(Message::Close(_)))))
        .filter_map(|message| {
            futures::future::ready(match message {
                Ok(Message::Text(text)) => Some(text.as_str().to_string()),
                _ => None,
            })
        });

    debug!("Bridge connection opened");
    let end = state
        .bridge
        .serve(Box::pin(inbound), outbound_tx, state.events.subscribe())
        .await;
    debug!("Bridge connection ended: {:?}", end);

    let _ = writer.await;
}
