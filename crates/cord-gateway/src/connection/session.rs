//! Session state
//!
//! Continuity data needed to resume a dropped connection. Written by the
//! dispatch loop, read by whoever drives heartbeats and reconnects.

use crate::protocol::{GatewayMessage, ResumePayload};
use parking_lot::RwLock;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SessionInner {
    sequence: Option<u64>,
    session_id: Option<String>,
    protocol_version: Option<u8>,
    resume_url: Option<String>,
}

/// Session state of one live connection
#[derive(Debug, Default)]
pub struct SessionState {
    inner: RwLock<SessionInner>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last sequence number seen on the connection
    pub fn current_sequence(&self) -> Option<u64> {
        self.inner.read().sequence
    }

    /// Record a sequence number; last write wins
    pub fn record_sequence(&self, sequence: u64) {
        self.inner.write().sequence = Some(sequence);
    }

    /// Record the session announced by READY
    pub fn record_session(&self, session_id: impl Into<String>, protocol_version: u8) {
        let mut inner = self.inner.write();
        inner.session_id = Some(session_id.into());
        inner.protocol_version = Some(protocol_version);
    }

    /// Record the URL to use when resuming
    pub fn record_resume_url(&self, url: impl Into<String>) {
        self.inner.write().resume_url = Some(url.into());
    }

    /// Forget everything; the next connection must identify from scratch
    pub fn clear(&self) {
        *self.inner.write() = SessionInner::default();
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.read().session_id.clone()
    }

    pub fn protocol_version(&self) -> Option<u8> {
        self.inner.read().protocol_version
    }

    pub fn resume_url(&self) -> Option<String> {
        self.inner.read().resume_url.clone()
    }

    /// Whether a RESUME could be attempted
    pub fn can_resume(&self) -> bool {
        let inner = self.inner.read();
        inner.session_id.is_some() && inner.sequence.is_some()
    }

    /// Build the RESUME (op 6) frame for this session, if resumable
    pub fn resume_payload(&self, token: impl Into<String>) -> Option<GatewayMessage> {
        let inner = self.inner.read();
        let payload = ResumePayload {
            token: token.into(),
            session_id: inner.session_id.clone()?,
            seq: inner.sequence?,
        };
        Some(GatewayMessage::resume(&payload))
    }

    /// Build a HEARTBEAT (op 1) frame carrying the current sequence
    pub fn heartbeat(&self) -> GatewayMessage {
        GatewayMessage::heartbeat(self.current_sequence())
    }
}
