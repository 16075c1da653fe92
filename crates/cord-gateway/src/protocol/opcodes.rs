//! Gateway operation codes
//!
//! Every inbound and outbound envelope carries one of these in its `op` field.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Gateway operation codes
///
/// Codes the client does not know are kept as [`OpCode::Unknown`] so that a
/// newer gateway never fails decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// An event was dispatched (receive)
    Dispatch,
    /// Heartbeat request or keepalive (send/receive)
    Heartbeat,
    /// Start a new session (send)
    Identify,
    /// Update the client's presence (send)
    PresenceUpdate,
    /// Join, move or leave a voice channel (send)
    VoiceStateUpdate,
    /// Resume a previous session (send)
    Resume,
    /// Server asks the client to reconnect and resume (receive)
    Reconnect,
    /// Request members of a guild (send)
    RequestGuildMembers,
    /// The session has been invalidated (receive)
    InvalidSession,
    /// Sent right after connecting, carries the heartbeat interval (receive)
    Hello,
    /// Heartbeat acknowledged (receive)
    HeartbeatAck,
    /// Any code this client does not recognise
    Unknown(u8),
}

impl OpCode {
    /// Map a raw integer to an op code; never fails
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            other => Self::Unknown(other),
        }
    }

    /// Map a wire integer to an op code; never fails
    ///
    /// Values past the `u8` range are collapsed to `Unknown(u8::MAX)`.
    #[must_use]
    pub fn from_raw(value: u64) -> Self {
        u8::try_from(value).map_or(Self::Unknown(u8::MAX), Self::from_u8)
    }

    /// Get the raw integer value
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Dispatch => 0,
            Self::Heartbeat => 1,
            Self::Identify => 2,
            Self::PresenceUpdate => 3,
            Self::VoiceStateUpdate => 4,
            Self::Resume => 6,
            Self::Reconnect => 7,
            Self::RequestGuildMembers => 8,
            Self::InvalidSession => 9,
            Self::Hello => 10,
            Self::HeartbeatAck => 11,
            Self::Unknown(value) => value,
        }
    }

    /// Check if this op code can be sent by the client
    #[must_use]
    pub const fn is_client_op(self) -> bool {
        matches!(
            self,
            Self::Heartbeat
                | Self::Identify
                | Self::PresenceUpdate
                | Self::VoiceStateUpdate
                | Self::Resume
                | Self::RequestGuildMembers
        )
    }

    /// Check if this op code can be sent by the server
    #[must_use]
    pub const fn is_server_op(self) -> bool {
        matches!(
            self,
            Self::Dispatch
                | Self::Heartbeat
                | Self::Reconnect
                | Self::InvalidSession
                | Self::Hello
                | Self::HeartbeatAck
        )
    }

    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Get the name of this op code
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "Dispatch",
            Self::Heartbeat => "Heartbeat",
            Self::Identify => "Identify",
            Self::PresenceUpdate => "PresenceUpdate",
            Self::VoiceStateUpdate => "VoiceStateUpdate",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::RequestGuildMembers => "RequestGuildMembers",
            Self::InvalidSession => "InvalidSession",
            Self::Hello => "Hello",
            Self::HeartbeatAck => "HeartbeatAck",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl From<u8> for OpCode {
    fn from(value: u8) -> Self {
        Self::from_u8(value)
    }
}

impl Serialize for OpCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u8::deserialize(deserializer).map(Self::from_u8)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}
