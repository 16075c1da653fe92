//! # cord-gateway
//!
//! Gateway client: decodes frames, tracks session continuity, keeps the entity
//! cache current and runs application hooks.

pub mod cache;
pub mod client;
pub mod codec;
pub mod connection;
pub mod dispatch;
pub mod events;
pub mod hooks;
pub mod protocol;

pub use cache::{CacheStats, CacheStore};
pub use client::{CancelHandle, GatewayClient, ShardHandle};
pub use codec::{FrameDecoder, RawFrame};
pub use connection::{ConnectionLoop, GatewayError, LoopExit, SessionState};
pub use dispatch::{DispatchError, EventDispatcher, InvalidSession};
pub use hooks::{HookName, HookPayload, HookRegistry};
pub use protocol::{CloseCode, Envelope, GatewayMessage, OpCode};
