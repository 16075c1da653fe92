//! Value objects - immutable types that represent domain concepts

mod connection_handle;
mod snowflake;

pub use connection_handle::ConnectionHandle;
pub use snowflake::{Snowflake, SnowflakeParseError};
