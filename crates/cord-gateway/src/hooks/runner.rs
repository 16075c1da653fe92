//! Per-connection hook queue
//!
//! The dispatch loop hands invocations over without waiting on them. A single
//! worker task drains the queue, so hooks of one connection never reorder.

use super::{HookInvocation, HookName, HookPayload, HookRegistry};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Ordered hook queue of one connection
#[derive(Debug)]
pub struct HookRunner {
    sender: mpsc::UnboundedSender<HookInvocation>,
    worker: JoinHandle<()>,
}

impl HookRunner {
    /// Spawn the worker; must be called inside a Tokio runtime
    pub fn spawn(registry: Arc<HookRegistry>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<HookInvocation>();

        let worker = tokio::spawn(async move {
            while let Some(invocation) = receiver.recv().await {
                tracing::trace!(hook = %invocation.name, "Running hooks");
                registry.dispatch(invocation.name, invocation.payload).await;
            }
        });

        Self { sender, worker }
    }

    /// Queue one invocation
    pub fn submit(&self, invocation: HookInvocation) {
        if self.sender.send(invocation).is_err() {
            tracing::warn!("Hook worker stopped, dropping invocation");
        }
    }

    /// Queue invocations in order
    pub fn submit_all(&self, invocations: impl IntoIterator<Item = HookInvocation>) {
        for invocation in invocations {
            self.submit(invocation);
        }
    }

    /// Queue a call of `name` with `payload`
    pub fn dispatch(&self, name: HookName, payload: HookPayload) {
        self.submit(HookInvocation::new(name, payload));
    }

    /// Close the queue and wait until everything queued so far has run
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "Hook worker failed");
        }
    }

    /// Close the queue without waiting for the worker
    ///
    /// Queued invocations still run in the background; the worker exits once
    /// the queue is drained.
    pub fn detach(self) {
        drop(self.sender);
        drop(self.worker);
    }
}
