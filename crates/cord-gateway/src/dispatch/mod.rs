//! Event dispatch
//!
//! Turns decoded envelopes into session updates, cache updates and hook calls.

mod dispatcher;
mod error;

pub use dispatcher::EventDispatcher;
pub use error::{DispatchError, InvalidSession};
