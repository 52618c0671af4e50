//! Bridge wire protocol
//!
//! Primary mode frames:
//! - request  `{"id": "...", "method": "...", "params": {...} | [...]}`
//! - response `{"id": "...", "result": ...}` or `{"id": "...", "error": "..."}`
//! - event    `{"event": "teardown" | "restart"}`
//!
//! Legacy mode envelopes: `{"type": "CLOSE" | "LOG" | "READY", "data": "..."}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::HostError;

/// Version reported to hosted content
pub const BRIDGE_VERSION: &str = "1.0.0";

/// The fixed set of host methods callable from content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeMethod {
    GetLocalStorageItem { key: String },
    SetLocalStorageItem { key: String, value: String },
    RemoveLocalStorageItem { key: String },
    ClearLocalStorage,
    CloseApp,
    LogMessage { text: String },
    GetHostInfo,
}

impl BridgeMethod {
    /// Wire name of the method
    pub fn name(&self) -> &'static str {
        match self {
            BridgeMethod::GetLocalStorageItem { .. } => "getLocalStorageItem",
            BridgeMethod::SetLocalStorageItem { .. } => "setLocalStorageItem",
            BridgeMethod::RemoveLocalStorageItem { .. } => "removeLocalStorageItem",
            BridgeMethod::ClearLocalStorage => "clearLocalStorage",
            BridgeMethod::CloseApp => "closeApp",
            BridgeMethod::LogMessage { .. } => "logMessage",
            BridgeMethod::GetHostInfo => "getHostInfo",
        }
    }

    /// Wire parameters of the method
    pub fn params(&self) -> Value {
        match self {
            BridgeMethod::GetLocalStorageItem { key }
            | BridgeMethod::RemoveLocalStorageItem { key } => json!({ "key": key }),
            BridgeMethod::SetLocalStorageItem { key, value } => {
                json!({ "key": key, "value": value })
            }
            BridgeMethod::LogMessage { text } => json!({ "text": text }),
            BridgeMethod::ClearLocalStorage | BridgeMethod::CloseApp | BridgeMethod::GetHostInfo => {
                json!({})
            }
        }
    }

    /// Decode a method call. Parameters may be named (`{"key": ..}`) or
    /// positional (`[..]`).
    pub fn parse(method: &str, params: &Value) -> Result<Self, HostError> {
        let call = match method {
            "getLocalStorageItem" => BridgeMethod::GetLocalStorageItem {
                key: string_param(params, "key", 0)?,
            },
            "setLocalStorageItem" => BridgeMethod::SetLocalStorageItem {
                key: string_param(params, "key", 0)?,
                value: string_param(params, "value", 1)?,
            },
            "removeLocalStorageItem" => BridgeMethod::RemoveLocalStorageItem {
                key: string_param(params, "key", 0)?,
            },
            "clearLocalStorage" => BridgeMethod::ClearLocalStorage,
            "closeApp" => BridgeMethod::CloseApp,
            "logMessage" => BridgeMethod::LogMessage {
                text: string_param(params, "text", 0)?,
            },
            "getHostInfo" => BridgeMethod::GetHostInfo,
            other => {
                return Err(HostError::ProtocolAnomaly(format!(
                    "unknown method {}",
                    other
                )))
            }
        };
        Ok(call)
    }
}

fn string_param(params: &Value, name: &str, position: usize) -> Result<String, HostError> {
    let value = match params {
        Value::Object(map) => map.get(name),
        Value::Array(items) => items.get(position),
        _ => None,
    };
    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(HostError::ProtocolAnomaly(format!(
            "missing parameter {}",
            name
        ))),
        Some(other) => Ok(other.to_string()),
    }
}

/// A decoded request frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRequest {
    pub id: String,
    pub method: BridgeMethod,
}

impl BridgeRequest {
    pub fn to_frame(&self) -> String {
        json!({
            "id": self.id,
            "method": self.method.name(),
            "params": self.method.params(),
        })
        .to_string()
    }
}

/// A response frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    pub fn ok(id: String, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: String, error: String) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    /// The call outcome; a frame with neither field resolves to `null`
    pub fn into_result(self) -> Result<Value, String> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Host-initiated lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostEvent {
    Teardown,
    Restart,
}

impl HostEvent {
    pub fn to_frame(&self) -> String {
        json!({ "event": self }).to_string()
    }
}

/// Legacy one-way message kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyMessage {
    Close,
    Log(String),
    Ready,
}

#[derive(Debug, Deserialize)]
struct LegacyEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Value>,
}

impl LegacyMessage {
    /// `Ok(None)` for well-formed envelopes of an unknown type
    pub fn parse(raw: &str) -> Result<Option<Self>, HostError> {
        let envelope: LegacyEnvelope = serde_json::from_str(raw)
            .map_err(|e| HostError::ProtocolAnomaly(format!("bad legacy envelope: {}", e)))?;
        Ok(LegacyMessage::from_parts(&envelope.kind, envelope.data))
    }

    fn from_parts(kind: &str, data: Option<Value>) -> Option<Self> {
        match kind {
            "CLOSE" => Some(LegacyMessage::Close),
            "READY" => Some(LegacyMessage::Ready),
            "LOG" => Some(LegacyMessage::Log(match data {
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => String::new(),
            })),
            _ => None,
        }
    }
}

/// Host information returned by `getHostInfo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub version: String,
    pub platform: String,
    pub is_web_view: bool,
    pub has_local_server: bool,
    pub has_bridge: bool,
}

impl Default for HostInfo {
    fn default() -> Self {
        Self {
            version: BRIDGE_VERSION.to_string(),
            platform: "mobile".to_string(),
            is_web_view: true,
            has_local_server: true,
            has_bridge: true,
        }
    }
}

/// Any frame content may send over the primary channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Request(BridgeRequest),
    /// Request with a usable id but an unknown method or bad parameters
    Rejected { id: String, reason: String },
    Legacy(Option<LegacyMessage>),
}

/// Classify a raw frame received by the host
pub fn parse_inbound(raw: &str) -> Result<InboundFrame, HostError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| HostError::ProtocolAnomaly(format!("malformed frame: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| HostError::ProtocolAnomaly("frame is not an object".to_string()))?;

    if let Some(kind) = object.get("type").and_then(Value::as_str) {
        if !object.contains_key("id") {
            let data = object.get("data").cloned();
            return Ok(InboundFrame::Legacy(LegacyMessage::from_parts(kind, data)));
        }
    }

    let id = match object.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(HostError::ProtocolAnomaly(
                "request without a correlation id".to_string(),
            ))
        }
    };

    let Some(method) = object.get("method").and_then(Value::as_str) else {
        return Ok(InboundFrame::Rejected {
            id,
            reason: "missing method".to_string(),
        });
    };
    let params = object.get("params").cloned().unwrap_or(Value::Null);

    match BridgeMethod::parse(method, &params) {
        Ok(method) => Ok(InboundFrame::Request(BridgeRequest { id, method })),
        Err(e) => Ok(InboundFrame::Rejected {
            id,
            reason: e.to_string(),
        }),
    }
}

/// Frames the content side receives
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Response(BridgeResponse),
    Event(HostEvent),
}

/// Classify a raw frame received by content
pub fn parse_outbound(raw: &str) -> Result<OutboundFrame, HostError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| HostError::ProtocolAnomaly(format!("malformed frame: {}", e)))?;

    if let Some(event) = value.get("event") {
        let event = serde_json::from_value(event.clone())
            .map_err(|e| HostError::ProtocolAnomaly(format!("unknown event: {}", e)))?;
        return Ok(OutboundFrame::Event(event));
    }

    let response = serde_json::from_value(value)
        .map_err(|e| HostError::ProtocolAnomaly(format!("malformed response: {}", e)))?;
    Ok(OutboundFrame::Response(response))
}
