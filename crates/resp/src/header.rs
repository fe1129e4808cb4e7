//! Interpretation of a tag byte and the line that follows it.
//!
//! Shared by the blocking and async readers: they do the I/O, this decides
//! what the line means and what has to be read next.

use log::trace;
use log::warn;

use crate::error::ParseError;
use crate::error::RespError;
use crate::options::ReaderOptions;
use crate::types::Blob;
use crate::types::MessageType;
use crate::types::RespValue;
use crate::utils::*;

/// Blob-shaped values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlobKind {
	String,
	Error,
	Verbatim,
}

impl BlobKind {
	pub(crate) fn build(self, blob: Blob) -> RespValue {
		match self {
			BlobKind::String => RespValue::BlobString(blob),
			BlobKind::Error => RespValue::BlobError(blob),
			BlobKind::Verbatim => RespValue::VerbatimString(blob),
		}
	}

	/// The value of a negative-length blob of this kind.
	pub(crate) fn null(self) -> RespValue {
		RespValue::TypedNull(match self {
			BlobKind::String => MessageType::BlobString,
			BlobKind::Error => MessageType::BlobError,
			BlobKind::Verbatim => MessageType::VerbatimString,
		})
	}
}

/// Declared length of a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlobLen {
	Null,
	Fixed(usize),
	Streamed,
}

/// Aggregate-shaped values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AggregateKind {
	Array,
	Set,
	Push,
	Map,
	Attribute,
}

impl AggregateKind {
	/// Map and attribute entries come in key / value pairs.
	pub(crate) fn is_paired(self) -> bool {
		matches!(self, AggregateKind::Map | AggregateKind::Attribute)
	}

	pub(crate) fn build(self, items: Vec<RespValue>) -> RespValue {
		match self {
			AggregateKind::Array => RespValue::Array(items),
			AggregateKind::Set => RespValue::Set(items),
			AggregateKind::Push => RespValue::Push(items),
			AggregateKind::Map => RespValue::Map(items),
			AggregateKind::Attribute => RespValue::Attribute(items),
		}
	}

	pub(crate) fn null(self) -> RespValue {
		RespValue::TypedNull(match self {
			AggregateKind::Array => MessageType::Array,
			AggregateKind::Set => MessageType::Set,
			AggregateKind::Push => MessageType::Push,
			AggregateKind::Map => MessageType::Map,
			AggregateKind::Attribute => MessageType::Attribute,
		})
	}
}

/// What a tag line turned out to be.
#[derive(Debug, PartialEq)]
pub(crate) enum Header {
	/// A complete scalar.
	Value(RespValue),
	/// A blob whose payload follows.
	Blob { kind: BlobKind, len: BlobLen },
	/// An aggregate header. `None` for streamed; the count is in entries, so a
	/// map of two pairs declares four.
	Aggregate {
		kind: AggregateKind,
		len: Option<usize>,
	},
	/// The `.` terminator of a streamed aggregate.
	End,
}

pub(crate) fn parse_header(tag: u8, line: &[u8], options: &ReaderOptions) -> Result<Header, RespError> {
	trace!("decoding tag {:?}", tag as char);
	let header = match tag {
		SIMPLE_STRING => Header::Value(RespValue::SimpleString(lossy(line))),
		SIMPLE_ERROR => {
			let text = lossy(line);
			if text == AUTH_REQUIRED {
				warn!("server requires authentication: {}", text);
				return Err(RespError::AuthRequired(text));
			}
			Header::Value(RespValue::SimpleError(text))
		}
		NUMBER => Header::Value(RespValue::Number(parse_integer(line)?)),
		BIG_NUMBER => Header::Value(RespValue::BigNumber(parse_big_number(line)?)),
		DOUBLE => Header::Value(RespValue::Double(parse_double(line)?)),
		BOOLEAN => Header::Value(RespValue::Boolean(parse_boolean(line)?)),
		NULL => Header::Value(RespValue::Null),
		BLOB_STRING => Header::Blob {
			kind: BlobKind::String,
			len: blob_len(line, options)?,
		},
		BLOB_ERROR => Header::Blob {
			kind: BlobKind::Error,
			len: blob_len(line, options)?,
		},
		VERBATIM_STRING => Header::Blob {
			kind: BlobKind::Verbatim,
			len: blob_len(line, options)?,
		},
		ARRAY => aggregate(AggregateKind::Array, line)?,
		SET => aggregate(AggregateKind::Set, line)?,
		PUSH => aggregate(AggregateKind::Push, line)?,
		MAP => aggregate(AggregateKind::Map, line)?,
		ATTRIBUTE => aggregate(AggregateKind::Attribute, line)?,
		END => Header::End,
		other => return Err(ParseError::InvalidTypeMarker(other).into()),
	};
	Ok(header)
}

/// Parse a blob length token: a non-negative count, a negative count (null),
/// or `?` (streamed).
pub(crate) fn blob_len(line: &[u8], options: &ReaderOptions) -> Result<BlobLen, ParseError> {
	if line == STREAMED {
		return Ok(BlobLen::Streamed);
	}
	let len = length_token(line)?;
	if len < 0 {
		return Ok(BlobLen::Null);
	}
	let len = len as u64;
	if len > options.max_blob_len as u64 {
		return Err(ParseError::BlobTooLarge {
			len,
			limit: options.max_blob_len,
		});
	}
	Ok(BlobLen::Fixed(len as usize))
}

/// Parse a streamed blob chunk header `;<len>`.
pub(crate) fn chunk_len(line: &[u8]) -> Result<usize, ParseError> {
	let invalid = || ParseError::InvalidChunkHeader(String::from_utf8_lossy(line).into_owned());
	match line.split_first() {
		Some((&CHUNK, digits)) => match parse_integer(digits) {
			Ok(n) if n >= 0 => usize::try_from(n).map_err(|_| invalid()),
			_ => Err(invalid()),
		},
		_ => Err(invalid()),
	}
}

fn aggregate(kind: AggregateKind, line: &[u8]) -> Result<Header, ParseError> {
	if line == STREAMED {
		return Ok(Header::Aggregate { kind, len: None });
	}
	let len = length_token(line)?;
	if len < 0 {
		return Ok(Header::Value(kind.null()));
	}
	let mut entries = usize::try_from(len).map_err(|_| invalid_length(line))?;
	if kind.is_paired() {
		entries = entries.checked_mul(2).ok_or_else(|| invalid_length(line))?;
	}
	Ok(Header::Aggregate {
		kind,
		len: Some(entries),
	})
}

fn length_token(line: &[u8]) -> Result<i64, ParseError> {
	parse_integer(line).map_err(|_| invalid_length(line))
}

fn invalid_length(line: &[u8]) -> ParseError {
	ParseError::InvalidLength(String::from_utf8_lossy(line).into_owned())
}

fn lossy(line: &[u8]) -> String {
	String::from_utf8_lossy(line).into_owned()
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	fn header(tag: u8, line: &[u8]) -> Result<Header, RespError> {
		parse_header(tag, line, &ReaderOptions::default())
	}

	#[rstest]
	#[case(b'+', b"OK", RespValue::SimpleString("OK".into()))]
	#[case(b'-', b"ERR bad", RespValue::SimpleError("ERR bad".into()))]
	#[case(b':', b"-42", RespValue::Number(-42))]
	#[case(b'(', b"123456789012345678901234567890", RespValue::BigNumber("123456789012345678901234567890".into()))]
	#[case(b',', b"1.5", RespValue::Double(1.5))]
	#[case(b'#', b"f", RespValue::Boolean(false))]
	#[case(b'_', b"", RespValue::Null)]
	#[case(b'*', b"-1", RespValue::TypedNull(MessageType::Array))]
	#[case(b'%', b"-1", RespValue::TypedNull(MessageType::Map))]
	#[case(b'~', b"-1", RespValue::TypedNull(MessageType::Set))]
	fn test_scalar_headers(#[case] tag: u8, #[case] line: &[u8], #[case] expected: RespValue) {
		assert_eq!(header(tag, line).unwrap(), Header::Value(expected));
	}

	#[rstest]
	#[case(b"5", BlobLen::Fixed(5))]
	#[case(b"0", BlobLen::Fixed(0))]
	#[case(b"-1", BlobLen::Null)]
	#[case(b"?", BlobLen::Streamed)]
	fn test_blob_len(#[case] line: &[u8], #[case] expected: BlobLen) {
		assert_eq!(blob_len(line, &ReaderOptions::default()).unwrap(), expected);
	}

	#[test]
	fn test_blob_too_large() {
		let options = ReaderOptions {
			max_blob_len: 10,
			..Default::default()
		};
		assert!(matches!(
			blob_len(b"11", &options),
			Err(ParseError::BlobTooLarge { len: 11, limit: 10 })
		));
	}

	#[test]
	fn test_map_declares_entries() {
		assert_eq!(
			header(b'%', b"2").unwrap(),
			Header::Aggregate {
				kind: AggregateKind::Map,
				len: Some(4)
			}
		);
		assert_eq!(
			header(b'~', b"?").unwrap(),
			Header::Aggregate {
				kind: AggregateKind::Set,
				len: None
			}
		);
	}

	#[rstest]
	#[case(b";5", Some(5))]
	#[case(b";0", Some(0))]
	#[case(b"5", None)]
	#[case(b";-1", None)]
	#[case(b";x", None)]
	#[case(b"", None)]
	fn test_chunk_len(#[case] line: &[u8], #[case] expected: Option<usize>) {
		assert_eq!(chunk_len(line).ok(), expected);
	}

	#[test]
	fn test_auth_required_is_raised() {
		match header(b'-', AUTH_REQUIRED.as_bytes()) {
			Err(RespError::AuthRequired(text)) => assert_eq!(text, AUTH_REQUIRED),
			other => panic!("expected auth failure, got {:?}", other),
		}
		// Only the exact text is special.
		assert!(header(b'-', b"NOAUTH Authentication required").is_ok());
	}

	#[rstest]
	#[case(b'$', b"abc")]
	#[case(b'*', b"")]
	#[case(b':', b"1.5")]
	#[case(b'#', b"x")]
	#[case(b'x', b"")]
	fn test_invalid_headers(#[case] tag: u8, #[case] line: &[u8]) {
		assert!(matches!(header(tag, line), Err(RespError::Protocol(_))));
	}
}
