//! Hook registry
//!
//! Application callbacks registered by name and invoked with the payload of
//! the event that triggered them.

use cord_core::Message;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Names hooks can be registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    /// READY was received
    Ready,
    /// A message was created
    Message,
    /// The gateway acknowledged a heartbeat
    Heartbeat,
    /// A guild that was not announced in READY became available
    GuildCreate,
    /// A raw frame arrived, before decoding
    SocketReceive,
}

impl HookName {
    pub const ALL: [Self; 5] = [
        Self::Ready,
        Self::Message,
        Self::Heartbeat,
        Self::GuildCreate,
        Self::SocketReceive,
    ];

    /// Public identifier of the hook
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Message => "message",
            Self::Heartbeat => "heartbeat",
            Self::GuildCreate => "guild_create",
            // Fixed public identifier, spelled this way on purpose
            Self::SocketReceive => "socket_recieve",
        }
    }

    /// Look up a hook by its public identifier
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|hook| hook.as_str() == name)
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments handed to a hook
#[derive(Debug, Clone, PartialEq)]
pub enum HookPayload {
    /// No arguments
    Empty,
    /// The materialized message
    Message(Arc<Message>),
    /// The raw guild payload
    Guild(Arc<Value>),
}

/// One pending hook call
#[derive(Debug, Clone, PartialEq)]
pub struct HookInvocation {
    pub name: HookName,
    pub payload: HookPayload,
}

impl HookInvocation {
    #[must_use]
    pub fn new(name: HookName, payload: HookPayload) -> Self {
        Self { name, payload }
    }

    #[must_use]
    pub fn empty(name: HookName) -> Self {
        Self::new(name, HookPayload::Empty)
    }
}

/// A registered callback
pub type Hook = Arc<dyn Fn(HookPayload) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Callbacks by hook name, in registration order
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<HashMap<HookName, Vec<Hook>>>,
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new registry wrapped in Arc
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a callback under `name`
    pub fn on<F, Fut>(&self, name: HookName, callback: F)
    where
        F: Fn(HookPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let hook: Hook = Arc::new(move |payload| -> BoxFuture<'static, anyhow::Result<()>> {
            Box::pin(callback(payload))
        });
        self.hooks.write().entry(name).or_default().push(hook);
    }

    /// Snapshot of the callbacks registered under `name`
    pub fn hooks(&self, name: HookName) -> Vec<Hook> {
        self.hooks.read().get(&name).cloned().unwrap_or_default()
    }

    pub fn has_hooks(&self, name: HookName) -> bool {
        self.hooks.read().get(&name).is_some_and(|hooks| !hooks.is_empty())
    }

    /// Run every callback of `name` in registration order
    ///
    /// Each callback runs as its own task; an error or panic is logged and the
    /// next callback still runs. Returns the number of failed callbacks.
    pub async fn dispatch(&self, name: HookName, payload: HookPayload) -> usize {
        let mut failed = 0;
        for hook in self.hooks(name) {
            let payload = payload.clone();
            match tokio::spawn(async move { hook(payload).await }).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    tracing::warn!(hook = %name, error = %e, "Hook returned an error");
                }
                Err(e) if e.is_panic() => {
                    failed += 1;
                    tracing::error!(hook = %name, "Hook panicked");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(hook = %name, error = %e, "Hook task cancelled");
                }
            }
        }
        failed
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&'static str, usize> = self
            .hooks
            .read()
            .iter()
            .map(|(name, hooks)| (name.as_str(), hooks.len()))
            .collect();
        f.debug_struct("HookRegistry").field("hooks", &counts).finish()
    }
}
