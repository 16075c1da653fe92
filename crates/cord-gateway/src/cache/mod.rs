//! Entity cache shared by all connections of a client

mod store;

pub use store::{CacheStats, CacheStore};
