//! Gateway message format
//!
//! Every frame on the wire is an object of the shape `{op, d, s, t}`.

use super::{HelloPayload, IdentifyPayload, OpCode, ResumePayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway message format
///
/// Used for frames the client sends, and by test servers for frames they emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Event data payload
    #[serde(default)]
    pub d: Value,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event type (only for op=0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayMessage {
    fn op_only(op: OpCode, d: Value) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }

    // === Client Messages ===

    /// Create a Heartbeat message (op=1) carrying the last sequence seen
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::op_only(
            OpCode::Heartbeat,
            last_sequence.map_or(Value::Null, |s| Value::Number(s.into())),
        )
    }

    /// Create an Identify message (op=2)
    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self::op_only(OpCode::Identify, to_data(payload))
    }

    /// Create a Resume message (op=6)
    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self::op_only(OpCode::Resume, to_data(payload))
    }

    // === Server Messages ===

    /// Create a Dispatch message (op=0)
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: data,
            s: Some(sequence),
            t: Some(event_type.into()),
        }
    }

    /// Create a Hello message (op=10)
    #[must_use]
    pub fn hello(payload: &HelloPayload) -> Self {
        Self::op_only(OpCode::Hello, to_data(payload))
    }

    /// Create a Heartbeat ACK message (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::op_only(OpCode::HeartbeatAck, Value::Null)
    }

    /// Create a Reconnect message (op=7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self::op_only(OpCode::Reconnect, Value::Null)
    }

    /// Create an Invalid Session message (op=9)
    ///
    /// `resumable` indicates if the session can be resumed.
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::op_only(OpCode::InvalidSession, Value::Bool(resumable))
    }

    // === Utilities ===

    /// Convert to a JSON value tree, the common input of both encoders
    #[must_use]
    pub fn to_value(&self) -> Value {
        to_data(self)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// Serializing these types into a `Value` cannot fail: every key is a string and
// no custom serializer returns an error.
fn to_data<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
