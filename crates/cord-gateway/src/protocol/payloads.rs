//! Payload definitions for non-dispatch operations
//!
//! HELLO is received from the server; IDENTIFY and RESUME are sent by the client.

use cord_core::ConnectionHandle;
use serde::{Deserialize, Serialize};

/// Payload for op 10 (Hello)
///
/// Sent by the server immediately after connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    /// Heartbeat interval the gateway advertises by default
    pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 41_250;

    /// Create a Hello payload with custom interval
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

impl Default for HelloPayload {
    fn default() -> Self {
        Self::with_interval(Self::DEFAULT_HEARTBEAT_INTERVAL)
    }
}

/// Payload for op 2 (Identify)
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Bot token
    pub token: String,

    /// Gateway intents bitmask
    pub intents: u64,

    /// Client connection properties
    pub properties: IdentifyProperties,

    /// `[shard_id, shard_count]`, omitted for unsharded connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,

    /// Member count above which offline members are not sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_threshold: Option<u16>,
}

impl IdentifyPayload {
    #[must_use]
    pub fn new(token: impl Into<String>, intents: u64) -> Self {
        Self {
            token: token.into(),
            intents,
            properties: IdentifyProperties::default(),
            shard: None,
            large_threshold: None,
        }
    }

    /// Attach the shard pair of `conn`; unsharded handles leave it out
    #[must_use]
    pub fn with_shard(mut self, conn: ConnectionHandle) -> Self {
        self.shard = (conn.shard_count() > 1).then(|| conn.shard_pair());
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = properties;
        self
    }
}

impl std::fmt::Debug for IdentifyPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifyPayload")
            .field("token", &"[REDACTED]")
            .field("intents", &self.intents)
            .field("properties", &self.properties)
            .field("shard", &self.shard)
            .field("large_threshold", &self.large_threshold)
            .finish()
    }
}

/// Client connection properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    /// Operating system
    pub os: String,

    /// Library name
    pub browser: String,

    /// Library name
    pub device: String,
}

impl IdentifyProperties {
    /// Set operating system
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    /// Set browser
    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = browser.into();
        self
    }

    /// Set device type
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: env!("CARGO_PKG_NAME").to_string(),
            device: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

/// Payload for op 6 (Resume)
///
/// Sent by the client to resume a disconnected session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Bot token
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: u64,
}

impl std::fmt::Debug for ResumePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumePayload")
            .field("token", &"[REDACTED]")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}
