//! Connection management
//!
//! Transport, session continuity state and the loop that drives one
//! connection.

mod error;
mod event_loop;
mod session;
mod transport;

pub use error::{GatewayError, TransportError};
pub use event_loop::{ConnectionLoop, LoopExit};
pub use session::SessionState;
pub use transport::{Inbound, InboundStream, Transport};
