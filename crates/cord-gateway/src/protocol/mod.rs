//! Gateway protocol definitions
//!
//! Op codes, the inbound envelope, outbound message builders and close codes.

mod close_codes;
mod envelope;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use envelope::Envelope;
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{HelloPayload, IdentifyPayload, IdentifyProperties, ResumePayload};
