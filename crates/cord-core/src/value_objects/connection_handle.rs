//! Connection handle - identifies the gateway connection an entity was observed on

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to the gateway connection (shard) that produced an entity
///
/// Resource models carry the handle of the connection they were materialized on so
/// that collaborators can route follow-up work to the same shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ConnectionHandle {
    shard_id: u32,
    shard_count: u32,
}

impl ConnectionHandle {
    /// Create a handle for shard `shard_id` of `shard_count`
    #[must_use]
    pub const fn new(shard_id: u32, shard_count: u32) -> Self {
        Self {
            shard_id,
            shard_count,
        }
    }

    /// Handle for an unsharded connection
    #[must_use]
    pub const fn unsharded() -> Self {
        Self::new(0, 1)
    }

    #[must_use]
    pub const fn shard_id(&self) -> u32 {
        self.shard_id
    }

    #[must_use]
    pub const fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// The `[shard_id, shard_count]` pair sent in Identify
    #[must_use]
    pub const fn shard_pair(&self) -> [u32; 2] {
        [self.shard_id, self.shard_count]
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard {}/{}", self.shard_id, self.shard_count)
    }
}
