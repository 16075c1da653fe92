//! Resource models materialized from gateway payloads

mod message;
mod user;

pub use message::{Message, MessageReference};
pub use user::User;
