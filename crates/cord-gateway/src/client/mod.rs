//! Gateway client
//!
//! Owns the process-wide cache and hook registry, and opens shard connections
//! that share them.

mod shard;

pub use shard::{CancelHandle, ShardHandle};

use crate::cache::CacheStore;
use crate::connection::{ConnectionLoop, GatewayError, SessionState, Transport, TransportError};
use crate::hooks::{HookName, HookPayload, HookRegistry};
use crate::protocol::{GatewayMessage, IdentifyPayload};
use cord_common::ClientConfig;
use cord_core::ConnectionHandle;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

/// Gateway client
#[derive(Debug)]
pub struct GatewayClient {
    config: ClientConfig,
    cache: Arc<CacheStore>,
    hooks: Arc<HookRegistry>,
}

impl GatewayClient {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            cache: CacheStore::new_shared(),
            hooks: HookRegistry::new_shared(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Cache shared by every shard of this client
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Register a hook callback
    pub fn on<F, Fut>(&self, name: HookName, callback: F)
    where
        F: Fn(HookPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hooks.on(name, callback);
    }

    /// Open every configured shard
    pub async fn connect_all(&self) -> Result<Vec<ShardHandle>, GatewayError> {
        let count = self.config.shards.count.max(1);
        let mut shards = Vec::with_capacity(count as usize);
        for shard_id in 0..count {
            shards.push(self.connect_shard(shard_id).await?);
        }
        Ok(shards)
    }

    /// Open shard `shard_id` with a fresh session and IDENTIFY
    pub async fn connect_shard(&self, shard_id: u32) -> Result<ShardHandle, GatewayError> {
        let conn = ConnectionHandle::new(shard_id, self.config.shards.count.max(1));
        self.open(conn, Arc::new(SessionState::new())).await
    }

    /// Reopen a dropped connection
    ///
    /// Sends RESUME against the session's resume URL when the session allows
    /// it, IDENTIFY otherwise.
    pub async fn reconnect(&self, conn: ConnectionHandle, session: Arc<SessionState>) -> Result<ShardHandle, GatewayError> {
        self.open(conn, session).await
    }

    async fn open(&self, conn: ConnectionHandle, session: Arc<SessionState>) -> Result<ShardHandle, GatewayError> {
        let gateway = &self.config.gateway;
        let resume = session.resume_payload(self.config.token.as_str());

        let url = match (&resume, session.resume_url()) {
            (Some(_), Some(base)) => gateway.connect_url_for(&base),
            _ => gateway.connect_url(),
        };

        tracing::info!(
            shard_id = conn.shard_id(),
            shard_count = conn.shard_count(),
            resuming = resume.is_some(),
            url = %url,
            "Connecting to gateway"
        );

        let transport = Transport::connect(&url, gateway.encoding, gateway.outbound_buffer).await?;

        let first = match resume {
            Some(message) => message,
            None => {
                session.clear();
                let identify = IdentifyPayload::new(self.config.token.as_str(), gateway.intents).with_shard(conn);
                GatewayMessage::identify(&identify)
            }
        };
        transport
            .outbound
            .send(first)
            .await
            .map_err(|_| TransportError::Closed)?;

        let (cancel, cancel_rx) = CancelHandle::new();
        let event_loop = ConnectionLoop::new(
            conn,
            gateway.compression,
            Arc::clone(&session),
            Arc::clone(&self.cache),
            Arc::clone(&self.hooks),
        );

        let span = tracing::info_span!("shard", shard_id = conn.shard_id());
        let task = tokio::spawn(event_loop.run(transport.inbound, cancel_rx).instrument(span));

        // The writer outlives the loop until the last sender is dropped
        drop(transport.writer);

        Ok(ShardHandle {
            conn,
            session,
            outbound: transport.outbound,
            cancel,
            task,
        })
    }
}
