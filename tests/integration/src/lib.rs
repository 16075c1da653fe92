//! Integration test utilities for the gateway client
//!
//! This crate provides an in-process mock gateway and envelope fixtures for
//! running end-to-end tests against the real WebSocket transport.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
