//! Connection errors

use crate::codec::{DecodeError, EncodeError};
use crate::dispatch::InvalidSession;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failures of the underlying WebSocket
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[source] Box<tungstenite::Error>),

    /// The outbound queue is gone; the writer task stopped
    #[error("connection closed")]
    Closed,
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Everything that ends a connection
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode frame: {0}")]
    Decode(#[from] DecodeError),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    InvalidSession(#[from] InvalidSession),

    #[error("connection task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl GatewayError {
    pub fn is_invalid_session(&self) -> bool {
        matches!(self, Self::InvalidSession(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether reconnecting with RESUME is worth trying
    ///
    /// An invalidated session always needs a fresh IDENTIFY.
    pub fn should_resume(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Decode(_))
    }
}
