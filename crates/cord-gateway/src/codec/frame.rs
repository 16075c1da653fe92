//! Frame decoding and encoding
//!
//! Decode-once boundary between raw transport frames and typed envelopes.

use super::{etf, DecodeError, EncodeError, ZlibStream};
use crate::protocol::{Envelope, GatewayMessage};
use cord_common::{Compression, Encoding};

/// One frame as it came off (or goes onto) the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl RawFrame {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

/// Per-connection inbound decoder
///
/// Holds the connection's decompression context, so one decoder must see every
/// binary frame of its connection in order.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    inflater: Option<ZlibStream>,
}

impl FrameDecoder {
    #[must_use]
    pub fn new(compression: Compression) -> Self {
        Self {
            inflater: match compression {
                Compression::ZlibStream => Some(ZlibStream::new()),
                Compression::None => None,
            },
        }
    }

    /// Decode one frame
    ///
    /// `Ok(None)` means "no envelope yet": a partial compressed payload or an
    /// empty frame. The caller skips it.
    pub fn decode(&mut self, frame: RawFrame) -> Result<Option<Envelope>, DecodeError> {
        match frame {
            RawFrame::Text(text) => decode_payload(text.as_bytes()),
            RawFrame::Binary(bytes) => match self.inflater.as_mut() {
                Some(inflater) => match inflater.push(&bytes)? {
                    Some(payload) => decode_payload(&payload),
                    None => Ok(None),
                },
                None => decode_payload(&bytes),
            },
        }
    }
}

/// Sniff the codec from the first byte and decode
fn decode_payload(payload: &[u8]) -> Result<Option<Envelope>, DecodeError> {
    match payload.first() {
        None => Ok(None),
        Some(b'{') => {
            let envelope = Envelope::from_slice(payload).map_err(DecodeError::Json)?;
            Ok(Some(envelope))
        }
        Some(_) => {
            let value = etf::decode(payload)?;
            Envelope::from_value(value)
                .map(Some)
                .map_err(DecodeError::Envelope)
        }
    }
}

/// Encode an outbound message in the negotiated encoding
pub fn encode_message(message: &GatewayMessage, encoding: Encoding) -> Result<RawFrame, EncodeError> {
    match encoding {
        Encoding::Json => Ok(RawFrame::Text(message.to_json()?)),
        Encoding::Etf => Ok(RawFrame::Binary(etf::encode(&message.to_value())?)),
    }
}
