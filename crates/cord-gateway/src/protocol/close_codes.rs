//! Gateway close codes
//!
//! Codes the gateway puts in its close frame, and what each one means for the
//! next connection attempt.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Gateway WebSocket close codes (4000-4014, 4006 unassigned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    /// The sequence sent in RESUME was rejected
    InvalidSequence = 4007,
    RateLimited = 4008,
    /// The session expired; RESUME is no longer possible
    SessionTimedOut = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    DisallowedIntents = 4014,
}

impl CloseCode {
    pub const ALL: [Self; 14] = [
        Self::UnknownError,
        Self::UnknownOpcode,
        Self::DecodeError,
        Self::NotAuthenticated,
        Self::AuthenticationFailed,
        Self::AlreadyAuthenticated,
        Self::InvalidSequence,
        Self::RateLimited,
        Self::SessionTimedOut,
        Self::InvalidShard,
        Self::ShardingRequired,
        Self::InvalidApiVersion,
        Self::InvalidIntents,
        Self::DisallowedIntents,
    ];

    /// Look up a raw close code; standard WebSocket codes yield `None`
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_u16() == value)
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether any new connection is allowed
    ///
    /// `false` means the configuration (token, shard, version, intents) has to
    /// change first.
    #[must_use]
    pub const fn should_reconnect(self) -> bool {
        !matches!(
            self,
            Self::AuthenticationFailed
                | Self::InvalidShard
                | Self::ShardingRequired
                | Self::InvalidApiVersion
                | Self::InvalidIntents
                | Self::DisallowedIntents
        )
    }

    /// Whether the next connection may RESUME instead of identifying again
    #[must_use]
    pub const fn allows_resume(self) -> bool {
        self.should_reconnect() && !matches!(self, Self::InvalidSequence | Self::SessionTimedOut)
    }

    /// Human-readable reason
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error",
            Self::UnknownOpcode => "Unknown opcode",
            Self::DecodeError => "Gateway could not decode a payload",
            Self::NotAuthenticated => "Payload sent before identifying",
            Self::AuthenticationFailed => "Authentication failed",
            Self::AlreadyAuthenticated => "Identified more than once",
            Self::InvalidSequence => "Invalid resume sequence",
            Self::RateLimited => "Rate limited",
            Self::SessionTimedOut => "Session timed out",
            Self::InvalidShard => "Invalid shard",
            Self::ShardingRequired => "Sharding required",
            Self::InvalidApiVersion => "Invalid API version",
            Self::InvalidIntents => "Invalid intents",
            Self::DisallowedIntents => "Disallowed intents",
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
