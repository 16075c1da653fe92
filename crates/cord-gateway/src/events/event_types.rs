//! Gateway event types
//!
//! Event names carried in the `t` field of dispatch envelopes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Gateway event types
///
/// Names the client does not handle are kept verbatim in [`GatewayEventType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    // Connection events
    /// Sent after successful Identify
    Ready,
    /// Sent after successful Resume
    Resumed,

    // Guild events
    /// Guild became available, was joined, or was created
    GuildCreate,
    /// Guild settings changed
    GuildUpdate,
    /// Left guild, kicked, or guild became unavailable
    GuildDelete,

    // Message events
    /// New message
    MessageCreate,
    /// Message edited
    MessageUpdate,
    /// Message deleted
    MessageDelete,

    /// Any other event name
    Other(String),
}

impl GatewayEventType {
    /// Get the wire name of the event type
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::Other(name) => name,
        }
    }

    /// Parse an event type from its wire name; never fails
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "READY" => Self::Ready,
            "RESUMED" => Self::Resumed,
            "GUILD_CREATE" => Self::GuildCreate,
            "GUILD_UPDATE" => Self::GuildUpdate,
            "GUILD_DELETE" => Self::GuildDelete,
            "MESSAGE_CREATE" => Self::MessageCreate,
            "MESSAGE_UPDATE" => Self::MessageUpdate,
            "MESSAGE_DELETE" => Self::MessageDelete,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for GatewayEventType {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<GatewayEventType> for String {
    fn from(event: GatewayEventType) -> Self {
        match event {
            GatewayEventType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl Serialize for GatewayEventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GatewayEventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::parse(&name))
    }
}
