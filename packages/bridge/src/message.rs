//! The message envelope exchanged between the two contexts.
//!
//! Every message crosses the channel as one JSON text frame:
//!
//! ```json
//! {"kind": "request", "correlationId": 7, "namespace": "N", "methodName": "foo", "args": {"x": 1}}
//! {"kind": "response", "correlationId": 7, "ok": true, "value": {"x": 1}}
//! {"kind": "response", "correlationId": 8, "ok": false, "errorInfo": {"kind": "MethodNotFound", "message": "..."}}
//! {"kind": "event", "namespace": "N", "eventName": "zoomChange", "payload": {"zoom": 4}}
//! ```

use serde::{Deserialize, Serialize};
use tandem_core::Value;

use crate::error::{BridgeError, ErrorInfo, Result};

/// Pairs a request with its response. Unique per dispatcher.
pub type CorrelationId = u64;

/// Event announcing a namespace registered on the privileged side.
/// The payload is `{"methods": [...]}`.
pub const REGISTER_EVENT: &str = "remote:register";

/// Event announcing a namespace was deregistered.
pub const DEREGISTER_EVENT: &str = "remote:deregister";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Message {
    Request {
        correlation_id: CorrelationId,
        namespace: String,
        method_name: String,
        #[serde(default)]
        args: Value,
    },
    Response {
        correlation_id: CorrelationId,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_info: Option<ErrorInfo>,
    },
    Event {
        #[serde(default)]
        namespace: String,
        event_name: String,
        #[serde(default)]
        payload: Value,
    },
}

impl Message {
    pub fn ok(correlation_id: CorrelationId, value: Value) -> Self {
        Message::Response {
            correlation_id,
            ok: true,
            value: Some(value),
            error_info: None,
        }
    }

    pub fn error(correlation_id: CorrelationId, error_info: ErrorInfo) -> Self {
        Message::Response {
            correlation_id,
            ok: false,
            value: None,
            error_info: Some(error_info),
        }
    }

    pub fn event(
        namespace: impl Into<String>,
        event_name: impl Into<String>,
        payload: impl Into<Value>,
    ) -> Self {
        Message::Event {
            namespace: namespace.into(),
            event_name: event_name.into(),
            payload: payload.into(),
        }
    }

    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            Message::Request { correlation_id, .. } | Message::Response { correlation_id, .. } => {
                Some(*correlation_id)
            }
            Message::Event { .. } => None,
        }
    }

    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_frame(frame: &str) -> Result<Self> {
        serde_json::from_str(frame).map_err(BridgeError::from)
    }
}

/// Payload of a [`REGISTER_EVENT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub methods: Vec<String>,
}
