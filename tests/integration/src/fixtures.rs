//! Test fixtures and frame builders
//!
//! Provides gateway envelopes and helpers that put them on the wire in each
//! encoding.

use std::io::Write;

use cord_gateway::codec::etf;
use cord_gateway::protocol::{GatewayMessage, HelloPayload};
use flate2::write::ZlibEncoder;
use serde_json::{json, Value};

use crate::helpers::ScriptFrame;

pub fn hello() -> GatewayMessage {
    GatewayMessage::hello(&HelloPayload::default())
}

/// READY for user `user_id` with the given unavailable guilds
pub fn ready(seq: u64, user_id: &str, guild_ids: &[&str], resume_url: Option<&str>) -> GatewayMessage {
    let guilds: Vec<Value> = guild_ids
        .iter()
        .map(|id| json!({"id": id, "unavailable": true}))
        .collect();

    let mut data = json!({
        "v": 10,
        "user": {"id": user_id, "username": "cord-bot", "bot": true},
        "guilds": guilds,
        "session_id": "mock-session"
    });
    if let Some(url) = resume_url {
        data["resume_gateway_url"] = json!(url);
    }

    GatewayMessage::dispatch("READY", seq, data)
}

pub fn guild_create(seq: u64, id: &str, name: &str) -> GatewayMessage {
    GatewayMessage::dispatch("GUILD_CREATE", seq, json!({"id": id, "name": name}))
}

pub fn message_create(seq: u64, channel_id: &str, id: &str, content: &str) -> GatewayMessage {
    GatewayMessage::dispatch(
        "MESSAGE_CREATE",
        seq,
        json!({
            "id": id,
            "channel_id": channel_id,
            "author": {"id": "42", "username": "someone"},
            "content": content,
            "timestamp": "2024-05-01T12:00:00+00:00",
            "mentions": [{"id": "1", "username": "cord-bot", "bot": true}]
        }),
    )
}

pub fn resumed(seq: u64) -> GatewayMessage {
    GatewayMessage::dispatch("RESUMED", seq, Value::Null)
}

/// Text frame carrying JSON
pub fn json_frame(message: &GatewayMessage) -> ScriptFrame {
    ScriptFrame::Text(message.to_value().to_string())
}

/// Binary frame carrying ETF
pub fn etf_frame(message: &GatewayMessage) -> ScriptFrame {
    ScriptFrame::Binary(etf::encode(&message.to_value()).unwrap())
}

/// Sender side of a zlib-stream connection
///
/// One compression context spans every frame, like the real gateway.
pub struct ZlibFrames {
    encoder: ZlibEncoder<Vec<u8>>,
}

impl Default for ZlibFrames {
    fn default() -> Self {
        Self {
            encoder: ZlibEncoder::new(Vec::new(), flate2::Compression::default()),
        }
    }
}

impl ZlibFrames {
    /// Compress one JSON payload, ending at a sync flush
    pub fn compress(&mut self, message: &GatewayMessage) -> Vec<u8> {
        self.encoder.write_all(message.to_value().to_string().as_bytes()).unwrap();
        self.encoder.flush().unwrap();
        std::mem::take(self.encoder.get_mut())
    }

    pub fn frame(&mut self, message: &GatewayMessage) -> ScriptFrame {
        ScriptFrame::Binary(self.compress(message))
    }

    /// Compress one payload and split it over two frames
    pub fn split_frames(&mut self, message: &GatewayMessage) -> [ScriptFrame; 2] {
        let bytes = self.compress(message);
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        [ScriptFrame::Binary(head.to_vec()), ScriptFrame::Binary(tail.to_vec())]
    }
}
