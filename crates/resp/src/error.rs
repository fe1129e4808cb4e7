//! Error types for RESP decoding.

use std::io;

use thiserror::Error;

use crate::encode::EncodeError;

/// Main error type for reading and writing RESP.
#[derive(Error, Debug)]
pub enum RespError {
	/// The bytes on the wire are not valid RESP3.
	#[error("Protocol error: {0}")]
	Protocol(#[from] ParseError),

	/// The server refused the command because the connection is not
	/// authenticated.
	#[error("Authentication required: {0}")]
	AuthRequired(String),

	/// The stream ended cleanly before the first byte of a value.
	#[error("Connection closed")]
	ConnectionClosed,

	/// The underlying stream failed.
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),

	#[error("Encode error: {0}")]
	Encode(#[from] EncodeError),
}

/// Protocol violations found while decoding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
	/// Unexpected end of input inside a value
	#[error("Unexpected end of input")]
	UnexpectedEOF,

	/// Tag byte outside the RESP3 tag set
	#[error("Invalid type marker: 0x{0:02x}")]
	InvalidTypeMarker(u8),

	/// CR not followed by LF
	#[error("Invalid line terminator")]
	InvalidLineTerminator,

	/// Line longer than the configured limit
	#[error("Line exceeds maximum length of {0} bytes")]
	LineTooLong(usize),

	/// Length token that is neither an integer nor `?`
	#[error("Invalid length: {0}")]
	InvalidLength(String),

	/// Invalid integer value
	#[error("Invalid integer: {0}")]
	InvalidInteger(String),

	/// Invalid double value
	#[error("Invalid double: {0}")]
	InvalidDouble(String),

	/// Boolean other than `t` / `f`
	#[error("Invalid boolean: {0}")]
	InvalidBoolean(String),

	/// Big number that is not an optionally signed digit string
	#[error("Invalid big number: {0}")]
	InvalidBigNumber(String),

	/// Streamed blob chunk header that is not `;<len>`
	#[error("Invalid chunk header: {0}")]
	InvalidChunkHeader(String),

	/// Blob payload not followed by CRLF
	#[error("Missing CRLF after blob payload")]
	MissingBlobTerminator,

	/// Blob larger than the configured limit
	#[error("Blob of {len} bytes exceeds limit of {limit} bytes")]
	BlobTooLarge { len: u64, limit: usize },

	/// `.` outside a streamed aggregate, or in the value slot of a streamed map
	#[error("Unexpected end marker")]
	UnexpectedEndMarker,

	/// Aggregates nested deeper than the configured limit
	#[error("Nesting exceeds maximum depth of {0}")]
	DepthExceeded(usize),

	/// A blob string was required but another tag arrived
	#[error("Expected blob string, found type marker 0x{0:02x}")]
	ExpectedBlobString(u8),
}

impl From<std::num::ParseIntError> for ParseError {
	fn from(e: std::num::ParseIntError) -> Self {
		ParseError::InvalidInteger(e.to_string())
	}
}

impl From<std::num::ParseFloatError> for ParseError {
	fn from(e: std::num::ParseFloatError) -> Self {
		ParseError::InvalidDouble(e.to_string())
	}
}

impl RespError {
	/// True for errors after which the stream position is unknown and the
	/// connection should be dropped.
	pub fn is_fatal(&self) -> bool {
		!matches!(self, RespError::AuthRequired(_) | RespError::Encode(_))
	}
}
