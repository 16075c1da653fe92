//! Gateway events
//!
//! Dispatch event names and the payloads the dispatcher materializes.

mod event_types;
mod payloads;

pub use event_types::GatewayEventType;
pub use payloads::{GuildCreateEvent, ReadyEvent, UnavailableGuild};
