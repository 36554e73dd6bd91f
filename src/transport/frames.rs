//! Push Frames
//!
//! JSON messages the backend pushes over the WebSocket, plus the body of a
//! streamed POST response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{TransportError, TransportResult};

/// Frame discriminator (`"type"` field)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Session id announcement, sent once when the channel opens
    Uuid,
    /// Named partial results for one request
    Callback,
    /// Terminal frame for one request
    Finish,
    /// Anything else; logged and ignored
    Other(String),
}

impl FrameKind {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "uuid" => Self::Uuid,
            "callback" => Self::Callback,
            "finish" => Self::Finish,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One decoded push frame. The raw JSON object is kept as-is so callback
/// payloads and the finish frame reach callers untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PushFrame {
    kind: FrameKind,
    body: Map<String, Value>,
}

impl PushFrame {
    /// Decode a text message
    pub fn parse(text: &str) -> TransportResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| TransportError::InvalidFrame(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> TransportResult<Self> {
        let Value::Object(body) = value else {
            return Err(TransportError::InvalidFrame(
                "frame is not a JSON object".to_string(),
            ));
        };

        let kind = body
            .get("type")
            .and_then(Value::as_str)
            .map(FrameKind::from_tag)
            .ok_or_else(|| TransportError::InvalidFrame("missing 'type' field".to_string()))?;

        Ok(Self { kind, body })
    }

    pub fn kind(&self) -> &FrameKind {
        &self.kind
    }

    /// Request this frame belongs to (callback and finish frames)
    pub fn request_uuid(&self) -> Option<&str> {
        self.body.get("request_uuid").and_then(Value::as_str)
    }

    /// Session id carried by a `uuid` frame
    pub fn session_uuid(&self) -> Option<&str> {
        self.body.get("uuid").and_then(Value::as_str)
    }

    /// Payload fields, excluding the envelope (`type`, `request_uuid`)
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.body
            .iter()
            .filter(|(k, _)| k.as_str() != "type" && k.as_str() != "request_uuid")
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

/// Response body of a streamed POST
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStart {
    /// Correlation id used by every push frame of this call
    pub request_uuid: String,
    /// Callback names the server will emit
    #[serde(default)]
    pub callbacks: Vec<String>,
}
