//! Wire codecs
//!
//! - Text frames and payloads starting with `{` => JSON
//! - Anything else => External Term Format
//! - Binary frames pass through the connection's zlib-stream context first

pub mod etf;
mod error;
mod frame;
mod inflate;

pub use error::{DecodeError, EncodeError};
pub use etf::EtfError;
pub use frame::{encode_message, FrameDecoder, RawFrame};
pub use inflate::{InflateError, ZlibStream, MAX_PENDING, ZLIB_SUFFIX};
