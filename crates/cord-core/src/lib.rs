//! # cord-core
//!
//! Domain layer containing identifiers, connection handles, and the resource models
//! materialized from gateway payloads. This crate has no dependency on the network
//! stack (transport, codecs, runtime).

pub mod entities;
pub mod error;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{Message, MessageReference, User};
pub use error::ModelError;
pub use value_objects::{ConnectionHandle, Snowflake, SnowflakeParseError};
