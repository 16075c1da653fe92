//! zlib-stream transport decompression
//!
//! The gateway compresses the whole connection as one zlib stream and
//! sync-flushes after every payload, so a payload is complete once the
//! buffered bytes end with the flush marker.

use flate2::{Decompress, DecompressError, FlushDecompress, Status};
use thiserror::Error;

/// Trailer emitted by a zlib sync flush
pub const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// Compressed bytes held back waiting for the flush marker, at most
pub const MAX_PENDING: usize = 16 * 1024 * 1024;

const CHUNK: usize = 32 * 1024;

#[derive(Debug, Error)]
pub enum InflateError {
    #[error("{0}")]
    Corrupt(#[from] DecompressError),

    #[error("{pending} compressed bytes without a flush marker (limit {limit})")]
    Unterminated { pending: usize, limit: usize },
}

/// One inflate context, alive for the whole connection
pub struct ZlibStream {
    inflater: Decompress,
    buffer: Vec<u8>,
    max_pending: usize,
}

impl ZlibStream {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_PENDING)
    }

    /// Stream that gives up once `max_pending` bytes arrive without a flush
    #[must_use]
    pub fn with_limit(max_pending: usize) -> Self {
        Self {
            inflater: Decompress::new(true),
            buffer: Vec::new(),
            max_pending,
        }
    }

    /// Feed one binary frame
    ///
    /// Returns `None` while the payload is still incomplete, or when the flush
    /// produced no bytes.
    pub fn push(&mut self, frame: &[u8]) -> Result<Option<Vec<u8>>, InflateError> {
        let pending = self.buffer.len().saturating_add(frame.len());
        if pending > self.max_pending {
            self.buffer.clear();
            return Err(InflateError::Unterminated {
                pending,
                limit: self.max_pending,
            });
        }

        self.buffer.extend_from_slice(frame);
        if !self.buffer.ends_with(&ZLIB_SUFFIX) {
            return Ok(None);
        }

        let input = std::mem::take(&mut self.buffer);
        let mut output = Vec::with_capacity(input.len().saturating_mul(4).max(CHUNK));
        let mut offset = 0;

        loop {
            if output.len() == output.capacity() {
                output.reserve(CHUNK);
            }

            let in_before = self.inflater.total_in();
            let out_before = self.inflater.total_out();
            let status = self.inflater.decompress_vec(
                input.get(offset..).unwrap_or_default(),
                &mut output,
                FlushDecompress::Sync,
            )?;
            let consumed = (self.inflater.total_in() - in_before) as usize;
            let produced = self.inflater.total_out() - out_before;
            offset += consumed;

            let drained = offset >= input.len() && output.len() < output.capacity();
            let stalled = consumed == 0 && produced == 0;
            if drained || stalled || status == Status::StreamEnd {
                break;
            }
        }

        Ok((!output.is_empty()).then_some(output))
    }

    /// Bytes held back waiting for the flush marker
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for ZlibStream {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ZlibStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZlibStream")
            .field("total_in", &self.inflater.total_in())
            .field("total_out", &self.inflater.total_out())
            .field("pending", &self.buffer.len())
            .field("max_pending", &self.max_pending)
            .finish()
    }
}
