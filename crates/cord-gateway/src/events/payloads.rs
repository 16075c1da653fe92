//! Event payload definitions
//!
//! Typed views over the dispatch payloads the dispatcher inspects. Everything
//! else stays as raw JSON.

use cord_core::{ConnectionHandle, ModelError, Snowflake, User};
use serde::Deserialize;
use serde_json::Value;

// === Connection Events ===

/// READY event payload
///
/// Sent after successful Identify.
#[derive(Debug, Clone)]
pub struct ReadyEvent {
    /// Gateway protocol version
    pub v: u8,

    /// Current user, bound to the receiving connection
    pub user: User,

    /// Guilds the user is in (initially unavailable)
    pub guilds: Vec<UnavailableGuild>,

    /// Session ID for resuming
    pub session_id: String,

    /// Gateway URL for resuming
    pub resume_gateway_url: Option<String>,
}

#[derive(Deserialize)]
struct RawReady {
    v: u8,
    user: Value,
    #[serde(default)]
    guilds: Vec<UnavailableGuild>,
    session_id: String,
    #[serde(default)]
    resume_gateway_url: Option<String>,
}

impl ReadyEvent {
    pub fn from_payload(conn: ConnectionHandle, data: &Value) -> Result<Self, ModelError> {
        let raw = RawReady::deserialize(data).map_err(|e| ModelError::payload("ready", e))?;
        Ok(Self {
            v: raw.v,
            user: User::from_payload(conn, &raw.user)?,
            guilds: raw.guilds,
            session_id: raw.session_id,
            resume_gateway_url: raw.resume_gateway_url,
        })
    }

    /// Ids of the guilds announced in this READY
    pub fn guild_ids(&self) -> impl Iterator<Item = Snowflake> + '_ {
        self.guilds.iter().map(|g| g.id)
    }
}

/// Unavailable guild in READY event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default = "default_unavailable")]
    pub unavailable: bool,
}

fn default_unavailable() -> bool {
    true
}

impl UnavailableGuild {
    #[must_use]
    pub fn new(id: Snowflake) -> Self {
        Self {
            id,
            unavailable: true,
        }
    }
}

// === Guild Events ===

/// Identifying part of a GUILD_CREATE payload
///
/// The full payload is cached untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GuildCreateEvent {
    pub id: Snowflake,
}

impl GuildCreateEvent {
    pub fn from_payload(data: &Value) -> Result<Self, ModelError> {
        Self::deserialize(data).map_err(|e| ModelError::payload("guild", e))
    }
}
