//! Connection loop
//!
//! Pulls frames off one connection, decodes them, applies them through the
//! dispatcher and queues the resulting hooks. Runs until the peer closes, the
//! stream ends, a fatal error occurs or it is cancelled.

use super::{GatewayError, Inbound, SessionState, TransportError};
use crate::cache::CacheStore;
use crate::codec::{FrameDecoder, RawFrame};
use crate::dispatch::{DispatchError, EventDispatcher};
use crate::hooks::{HookName, HookPayload, HookRegistry, HookRunner};
use crate::protocol::CloseCode;
use cord_common::Compression;
use cord_core::ConnectionHandle;
use futures::Stream;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;

/// How a loop ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The peer sent a close frame
    Closed { code: Option<u16> },
    /// Cancelled by the owner
    Cancelled,
    /// The transport ended without a close frame
    StreamEnded,
}

impl LoopExit {
    /// The gateway close code, if the peer sent a known one
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            Self::Closed { code: Some(code) } => CloseCode::from_u16(*code),
            _ => None,
        }
    }

    /// Whether opening a new connection makes sense
    pub fn should_reconnect(&self) -> bool {
        match self {
            Self::Cancelled => false,
            Self::Closed { .. } => self.close_code().map_or(true, CloseCode::should_reconnect),
            Self::StreamEnded => true,
        }
    }
}

/// Consumer of one connection
#[derive(Debug)]
pub struct ConnectionLoop {
    decoder: FrameDecoder,
    dispatcher: EventDispatcher,
    hooks: HookRunner,
}

impl ConnectionLoop {
    /// Build the loop; spawns the hook worker, so call inside a Tokio runtime
    pub fn new(
        conn: ConnectionHandle,
        compression: Compression,
        session: Arc<SessionState>,
        cache: Arc<CacheStore>,
        registry: Arc<HookRegistry>,
    ) -> Self {
        Self {
            decoder: FrameDecoder::new(compression),
            dispatcher: EventDispatcher::new(conn, session, cache),
            hooks: HookRunner::spawn(registry),
        }
    }

    /// Drive the loop until it ends
    ///
    /// Cancellation is observed between frames. On any other exit, hooks queued
    /// so far run before this returns; a cancelled loop returns right away and
    /// leaves them to finish in the background.
    pub async fn run<S>(mut self, inbound: S, cancel: watch::Receiver<bool>) -> Result<LoopExit, GatewayError>
    where
        S: Stream<Item = Result<Inbound, TransportError>> + Unpin,
    {
        let shard_id = self.dispatcher.connection().shard_id();
        let result = self.drive(inbound, cancel).await;

        match &result {
            Ok(exit) => tracing::info!(shard_id, exit = ?exit, "Connection loop stopped"),
            Err(e) => tracing::warn!(shard_id, error = %e, "Connection loop failed"),
        }

        if matches!(result, Ok(LoopExit::Cancelled)) {
            self.hooks.detach();
        } else {
            self.hooks.shutdown().await;
        }
        result
    }

    async fn drive<S>(&mut self, mut inbound: S, mut cancel: watch::Receiver<bool>) -> Result<LoopExit, GatewayError>
    where
        S: Stream<Item = Result<Inbound, TransportError>> + Unpin,
    {
        loop {
            if *cancel.borrow_and_update() {
                return Ok(LoopExit::Cancelled);
            }

            let next = tokio::select! {
                biased;
                changed = cancel.changed() => {
                    // A dropped owner counts as cancellation
                    if changed.is_err() {
                        return Ok(LoopExit::Cancelled);
                    }
                    continue;
                }
                next = inbound.next() => next,
            };

            match next {
                None => return Ok(LoopExit::StreamEnded),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Inbound::Close(code))) => return Ok(LoopExit::Closed { code }),
                Some(Ok(Inbound::Frame(frame))) => self.process(frame)?,
            }
        }
    }

    /// Decode and dispatch one frame
    fn process(&mut self, frame: RawFrame) -> Result<(), GatewayError> {
        let shard_id = self.dispatcher.connection().shard_id();
        self.hooks.dispatch(HookName::SocketReceive, HookPayload::Empty);

        let Some(envelope) = self.decoder.decode(frame)? else {
            tracing::trace!(shard_id, "No envelope in frame");
            return Ok(());
        };

        tracing::trace!(
            shard_id,
            op = %envelope.op,
            event = envelope.event_name(),
            seq = ?envelope.sequence,
            "Envelope received"
        );

        let mut invocations = Vec::new();
        let outcome = self.dispatcher.handle_into(envelope, &mut invocations);
        self.hooks.submit_all(invocations);

        match outcome {
            Ok(()) => Ok(()),
            Err(DispatchError::InvalidSession(invalid)) => Err(invalid.into()),
            Err(e @ DispatchError::MalformedEvent { .. }) => {
                tracing::warn!(shard_id, error = %e, "Skipping malformed event");
                Ok(())
            }
        }
    }
}
