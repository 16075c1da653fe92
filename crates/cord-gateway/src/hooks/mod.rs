//! Notification hooks
//!
//! Application callbacks keyed by name, run off the dispatch loop in order.

mod registry;
mod runner;

pub use registry::{Hook, HookInvocation, HookName, HookPayload, HookRegistry};
pub use runner::HookRunner;
