//! Dispatch errors

use crate::events::GatewayEventType;
use cord_core::ModelError;
use std::fmt;
use thiserror::Error;

/// The gateway invalidated the session
///
/// Always fatal to the session: the connection must identify again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSession {
    /// The `d` flag sent with the opcode
    pub resumable: bool,
    /// Human-readable likely causes
    pub causes: Vec<&'static str>,
}

impl InvalidSession {
    /// Most frequent reasons the gateway rejects a session
    pub const COMMON_CAUSES: [&'static str; 3] = [
        "invalid or disallowed gateway intents",
        "token lacks the required authorization scope",
        "session expired before it could be resumed",
    ];

    #[must_use]
    pub fn new(resumable: bool) -> Self {
        Self {
            resumable,
            causes: Self::COMMON_CAUSES.to_vec(),
        }
    }
}

impl fmt::Display for InvalidSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid session (resumable: {}); common causes:", self.resumable)?;
        for cause in &self.causes {
            write!(f, "\n* {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidSession {}

/// Errors raised while dispatching one envelope
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidSession(#[from] InvalidSession),

    /// The payload could not be materialized; the envelope was skipped
    #[error("malformed {event} event: {source}")]
    MalformedEvent {
        event: GatewayEventType,
        #[source]
        source: ModelError,
    },
}

impl DispatchError {
    /// Whether the connection can keep consuming frames
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidSession(_))
    }
}
