//! Event dispatcher
//!
//! Applies one envelope to session state and the cache, and reports which
//! hooks it triggers. Hooks are not run here; the caller queues them once the
//! state updates are done.

use super::{DispatchError, InvalidSession};
use crate::cache::CacheStore;
use crate::connection::SessionState;
use crate::events::{GatewayEventType, GuildCreateEvent, ReadyEvent};
use crate::hooks::{HookInvocation, HookName, HookPayload};
use crate::protocol::{Envelope, OpCode};
use cord_core::{ConnectionHandle, Message, ModelError, Snowflake};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Dispatcher of one connection
#[derive(Debug)]
pub struct EventDispatcher {
    conn: ConnectionHandle,
    session: Arc<SessionState>,
    cache: Arc<CacheStore>,
    /// Guilds announced in READY whose GUILD_CREATE has not arrived yet
    unavailable_guilds: HashSet<Snowflake>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new(conn: ConnectionHandle, session: Arc<SessionState>, cache: Arc<CacheStore>) -> Self {
        Self {
            conn,
            session,
            cache,
            unavailable_guilds: HashSet::new(),
        }
    }

    pub fn connection(&self) -> ConnectionHandle {
        self.conn
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Guilds still waiting for their GUILD_CREATE
    pub fn unavailable_guilds(&self) -> &HashSet<Snowflake> {
        &self.unavailable_guilds
    }

    /// Handle one envelope
    ///
    /// The sequence is recorded before anything else, so it sticks even when a
    /// later step fails.
    pub fn handle(&mut self, envelope: Envelope) -> Result<Vec<HookInvocation>, DispatchError> {
        let mut hooks = Vec::new();
        self.handle_into(envelope, &mut hooks)?;
        Ok(hooks)
    }

    /// Handle one envelope, appending triggered hooks to `hooks`
    ///
    /// Hooks triggered before a failing step stay in `hooks`: "ready" is queued
    /// before the READY payload is read.
    pub fn handle_into(&mut self, envelope: Envelope, hooks: &mut Vec<HookInvocation>) -> Result<(), DispatchError> {
        if let Some(sequence) = envelope.sequence {
            self.session.record_sequence(sequence);
        }

        match envelope.op {
            OpCode::InvalidSession => {
                let resumable = envelope.data.as_bool().unwrap_or(false);
                self.session.clear();
                self.unavailable_guilds.clear();
                tracing::warn!(shard_id = self.conn.shard_id(), resumable, "Session invalidated");
                return Err(InvalidSession::new(resumable).into());
            }
            OpCode::HeartbeatAck => hooks.push(HookInvocation::empty(HookName::Heartbeat)),
            _ => {}
        }

        let Some(event) = envelope.event else {
            return Ok(());
        };

        let data = envelope.data;
        match &event {
            GatewayEventType::Ready => {
                hooks.push(HookInvocation::empty(HookName::Ready));
                self.on_ready(&data).map_err(|source| malformed(&event, source))?;
            }
            GatewayEventType::MessageCreate => {
                let message = self.on_message_create(&data).map_err(|source| malformed(&event, source))?;
                hooks.push(HookInvocation::new(HookName::Message, HookPayload::Message(message)));
            }
            GatewayEventType::GuildCreate => {
                let announced = self.on_guild_create(data.clone()).map_err(|source| malformed(&event, source))?;
                if !announced {
                    hooks.push(HookInvocation::new(
                        HookName::GuildCreate,
                        HookPayload::Guild(Arc::new(data)),
                    ));
                }
            }
            _ => {
                tracing::trace!(shard_id = self.conn.shard_id(), event = %event, "Unhandled event");
            }
        }

        Ok(())
    }

    fn on_ready(&mut self, data: &Value) -> Result<(), ModelError> {
        let ready = ReadyEvent::from_payload(self.conn, data)?;

        self.session.record_session(ready.session_id.clone(), ready.v);
        if let Some(url) = &ready.resume_gateway_url {
            self.session.record_resume_url(url.clone());
        }
        self.unavailable_guilds = ready.guild_ids().collect();

        tracing::info!(
            shard_id = self.conn.shard_id(),
            session_id = %ready.session_id,
            user_id = %ready.user.id,
            guilds = ready.guilds.len(),
            "Session ready"
        );

        self.cache.insert_user(ready.user);
        Ok(())
    }

    fn on_message_create(&self, data: &Value) -> Result<Arc<Message>, ModelError> {
        let message = Message::from_payload(self.conn, data)?;
        self.cache.insert_message(message.clone());
        Ok(Arc::new(message))
    }

    /// Cache the guild; returns whether it was one announced in READY
    fn on_guild_create(&mut self, data: Value) -> Result<bool, ModelError> {
        let guild = GuildCreateEvent::from_payload(&data)?;
        let announced = self.unavailable_guilds.remove(&guild.id);

        tracing::debug!(
            shard_id = self.conn.shard_id(),
            guild_id = %guild.id,
            announced,
            "Guild available"
        );

        self.cache.insert_guild(guild.id, data);
        Ok(announced)
    }
}

fn malformed(event: &GatewayEventType, source: ModelError) -> DispatchError {
    DispatchError::MalformedEvent {
        event: event.clone(),
        source,
    }
}
