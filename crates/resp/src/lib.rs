//! # RESP - RESP3 reader and command writer
//!
//! Decodes one [`RespValue`] at a time from any byte stream and frames
//! outbound commands as arrays of blob strings.
//!
//! ## Features
//!
//! - **Stream driven**: [`Resp3Reader`] reads from `std::io::Read`,
//!   [`AsyncResp3Reader`] from `tokio::io::AsyncRead`. Both decode through the
//!   same frame-stack assembler and produce identical values.
//! - **Full RESP3**: fixed and streamed (`?`) aggregates, streamed blob
//!   strings, attributes, push messages, verbatim strings, big numbers.
//! - **Pooled scratch memory**: line, blob and chunk buffers come from a
//!   [`mempool::BufferPool`] and go back on every exit path.
//! - **Hardened**: nesting depth, blob size and line length are bounded by
//!   [`ReaderOptions`].
//!
//! ## Example
//!
//! ```rust
//! use mempool::BufferPool;
//! use resp::{Decode, Resp3Reader, RespValue};
//!
//! let wire = &b"*3\r\n:1\r\n:2\r\n:3\r\n"[..];
//! let mut reader = Resp3Reader::new(wire, BufferPool::default());
//! let value = reader.read_object(Decode::Utf8).unwrap();
//! assert_eq!(
//! 	value,
//! 	RespValue::Array(vec![RespValue::Number(1), RespValue::Number(2), RespValue::Number(3)])
//! );
//! ```

mod assembler;
mod async_reader;
mod encode;
mod error;
mod header;
mod options;
mod reader;
mod types;
mod utils;

pub use async_reader::AsyncResp3Reader;
pub use encode::EncodeError;
pub use encode::RespEncoder;
pub use encode::encode_command;
pub use encode::write_command;
pub use encode::write_command_async;
pub use error::ParseError;
pub use error::RespError;
pub use options::ReaderOptions;
pub use reader::Resp3Reader;
pub use types::Blob;
pub use types::Decode;
pub use types::MessageType;
pub use types::RespValue;
pub use utils::AUTH_REQUIRED;
