//! User entity - a gateway user account

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;
use crate::value_objects::{ConnectionHandle, Snowflake};

const CDN_BASE: &str = "https://cdn.discordapp.com";

/// User entity as delivered in READY, message authors, and mentions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Connection the user was observed on
    #[serde(skip)]
    pub conn: ConnectionHandle,
    pub id: Snowflake,
    pub username: String,
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub system: bool,
}

fn default_discriminator() -> String {
    "0".to_string()
}

impl User {
    /// Materialize a user from a raw payload, bound to `conn`
    pub fn from_payload(conn: ConnectionHandle, data: &Value) -> Result<Self, ModelError> {
        let mut user = Self::deserialize(data).map_err(|e| ModelError::payload("user", e))?;
        user.conn = conn;
        Ok(user)
    }

    /// Get the full tag: username#discriminator, or just the username for
    /// accounts migrated off discriminators
    pub fn tag(&self) -> String {
        if self.has_legacy_discriminator() {
            format!("{}#{}", self.username, self.discriminator)
        } else {
            self.username.clone()
        }
    }

    /// Name shown in clients
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    /// Mention markup for this user
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    /// Get avatar URL or default avatar URL
    pub fn avatar_url(&self) -> String {
        match &self.avatar {
            Some(hash) => {
                let ext = if hash.starts_with("a_") { "gif" } else { "png" };
                format!("{CDN_BASE}/avatars/{}/{hash}.{ext}", self.id)
            }
            None => format!("{CDN_BASE}/embed/avatars/{}.png", self.default_avatar_index()),
        }
    }

    fn has_legacy_discriminator(&self) -> bool {
        !self.discriminator.is_empty() && self.discriminator != "0"
    }

    fn default_avatar_index(&self) -> u64 {
        if self.has_legacy_discriminator() {
            self.discriminator.parse::<u64>().unwrap_or(0) % 5
        } else {
            (self.id.into_inner() >> 22) % 6
        }
    }

    /// Check if user is a bot account
    #[inline]
    pub fn is_bot(&self) -> bool {
        self.bot
    }

    /// Check if user is a system account
    #[inline]
    pub fn is_system(&self) -> bool {
        self.system
    }
}
