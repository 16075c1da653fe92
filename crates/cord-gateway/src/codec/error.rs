//! Codec errors

use super::etf::EtfError;
use super::inflate::InflateError;
use thiserror::Error;

/// A frame that could not be turned into an envelope
///
/// Always fatal to the connection that produced it.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("zlib stream failed: {0}")]
    Inflate(#[from] InflateError),

    #[error("invalid JSON frame: {0}")]
    Json(#[source] serde_json::Error),

    #[error("invalid ETF frame: {0}")]
    Etf(#[from] EtfError),

    #[error("frame is not a gateway envelope: {0}")]
    Envelope(#[source] serde_json::Error),
}

/// An outbound message that could not be encoded
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ETF encoding failed: {0}")]
    Etf(#[from] EtfError),
}
