//! Handle to a running shard connection

use crate::connection::{GatewayError, LoopExit, SessionState, TransportError};
use crate::protocol::GatewayMessage;
use cord_core::ConnectionHandle;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Cancels a shard's loop from anywhere
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self(Arc::new(tx)), rx)
    }

    /// Stop the loop before its next frame
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// A connected shard
#[derive(Debug)]
pub struct ShardHandle {
    pub(crate) conn: ConnectionHandle,
    pub(crate) session: Arc<SessionState>,
    pub(crate) outbound: mpsc::Sender<GatewayMessage>,
    pub(crate) cancel: CancelHandle,
    pub(crate) task: JoinHandle<Result<LoopExit, GatewayError>>,
}

impl ShardHandle {
    pub fn conn(&self) -> ConnectionHandle {
        self.conn
    }

    /// Session state of this connection
    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Sender for outbound messages; stays usable after this handle moves
    pub fn outbound(&self) -> mpsc::Sender<GatewayMessage> {
        self.outbound.clone()
    }

    pub fn canceller(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Queue a message for the writer task
    pub async fn send(&self, message: GatewayMessage) -> Result<(), GatewayError> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| TransportError::Closed.into())
    }

    /// Queue a HEARTBEAT carrying the last seen sequence
    pub async fn heartbeat(&self) -> Result<(), GatewayError> {
        self.send(self.session.heartbeat()).await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end
    ///
    /// The socket is closed once every outbound sender is dropped.
    pub async fn join(self) -> Result<LoopExit, GatewayError> {
        let Self { outbound, task, .. } = self;
        drop(outbound);
        task.await?
    }
}
