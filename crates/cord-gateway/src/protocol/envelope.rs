//! Inbound envelope
//!
//! The typed view of one decoded frame, validated once at the decode boundary.

use super::OpCode;
use crate::events::GatewayEventType;
use serde::Deserialize;
use serde_json::Value;

/// One decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Operation code (`op`)
    pub op: OpCode,
    /// Event name (`t`), absent outside of dispatches
    pub event: Option<GatewayEventType>,
    /// Sequence number (`s`)
    pub sequence: Option<u64>,
    /// Payload (`d`), null when missing
    pub data: Value,
}

#[derive(Deserialize)]
struct WireEnvelope {
    op: u64,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    d: Value,
}

impl From<WireEnvelope> for Envelope {
    fn from(wire: WireEnvelope) -> Self {
        Self {
            op: OpCode::from_raw(wire.op),
            event: wire.t.as_deref().map(GatewayEventType::parse),
            sequence: wire.s,
            data: wire.d,
        }
    }
}

impl Envelope {
    /// Build an envelope from a decoded value tree
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        WireEnvelope::deserialize(value).map(Self::from)
    }

    /// Parse an envelope straight from JSON text
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        Self::from_slice(text.as_bytes())
    }

    /// Parse an envelope from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<WireEnvelope>(bytes).map(Self::from)
    }

    /// Check whether this envelope is the named dispatch
    #[must_use]
    pub fn is_event(&self, event: &GatewayEventType) -> bool {
        self.event.as_ref() == Some(event)
    }

    /// Event name for logging; empty outside of dispatches
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.event.as_ref().map_or("", GatewayEventType::as_str)
    }
}
