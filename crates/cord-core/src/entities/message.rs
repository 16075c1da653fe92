//! Message entity - a channel message delivered by MESSAGE_CREATE

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::User;
use crate::error::ModelError;
use crate::value_objects::{ConnectionHandle, Snowflake};

/// Message entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Connection the message was observed on
    #[serde(skip)]
    pub conn: ConnectionHandle,
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub mention_everyone: bool,
    #[serde(default)]
    pub mentions: Vec<User>,
    #[serde(default)]
    pub mention_roles: Vec<Snowflake>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub flags: u64,
    #[serde(default)]
    pub webhook_id: Option<Snowflake>,
    #[serde(default)]
    pub attachments: Vec<Value>,
    #[serde(default)]
    pub embeds: Vec<Value>,
    #[serde(default)]
    pub message_reference: Option<MessageReference>,
}

/// Reference to the message being replied to or crossposted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReference {
    #[serde(default)]
    pub message_id: Option<Snowflake>,
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default = "default_fail_if_not_exists")]
    pub fail_if_not_exists: bool,
}

fn default_fail_if_not_exists() -> bool {
    true
}

impl Message {
    /// Materialize a message from a raw payload, bound to `conn`
    ///
    /// The author and mentioned users inherit the same connection handle.
    pub fn from_payload(conn: ConnectionHandle, data: &Value) -> Result<Self, ModelError> {
        if data.get("stickers").is_some_and(|s| !s.is_null()) {
            return Err(ModelError::InvalidField {
                entity: "message",
                field: "stickers",
                reason: "deprecated, use sticker_items".to_string(),
            });
        }

        let mut message = Self::deserialize(data).map_err(|e| ModelError::payload("message", e))?;
        message.conn = conn;
        message.author.conn = conn;
        for user in &mut message.mentions {
            user.conn = conn;
        }
        Ok(message)
    }

    /// Composite cache key: `"<channel_id>:<id>"`
    pub fn cache_key(&self) -> String {
        Self::key(self.channel_id, self.id)
    }

    /// Build the composite cache key for a channel/message pair
    pub fn key(channel_id: Snowflake, message_id: Snowflake) -> String {
        format!("{channel_id}:{message_id}")
    }

    /// Check if message has been edited
    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited_timestamp.is_some()
    }

    /// Check if message is a reply
    #[inline]
    pub fn is_reply(&self) -> bool {
        self.message_reference.is_some()
    }

    /// Check if message was sent through a webhook
    #[inline]
    pub fn is_webhook(&self) -> bool {
        self.webhook_id.is_some()
    }

    /// Check if message was sent in a guild channel
    #[inline]
    pub fn in_guild(&self) -> bool {
        self.guild_id.is_some()
    }

    /// Get a truncated preview of the message (for notifications)
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let mut end = max_len;
            while !self.content.is_char_boundary(end) && end > 0 {
                end -= 1;
            }
            &self.content[..end]
        }
    }

    /// Check if message content is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}
