//! Wire constants and token parsing for RESP3.

use crate::error::ParseError;

/// CRLF line ending
pub const CRLF: &[u8] = b"\r\n";

/// Simple error text that signals an unauthenticated connection. Matched
/// exactly.
pub const AUTH_REQUIRED: &str = "NOAUTH Authentication required.";

/// Type markers
pub const SIMPLE_STRING: u8 = b'+';
pub const SIMPLE_ERROR: u8 = b'-';
pub const NUMBER: u8 = b':';
pub const BLOB_STRING: u8 = b'$';
pub const ARRAY: u8 = b'*';
pub const NULL: u8 = b'_';
pub const BOOLEAN: u8 = b'#';
pub const DOUBLE: u8 = b',';
pub const BIG_NUMBER: u8 = b'(';
pub const BLOB_ERROR: u8 = b'!';
pub const VERBATIM_STRING: u8 = b'=';
pub const MAP: u8 = b'%';
pub const SET: u8 = b'~';
pub const PUSH: u8 = b'>';
pub const ATTRIBUTE: u8 = b'|';
pub const END: u8 = b'.';

/// Streamed-length sentinel and chunk marker
pub const STREAMED: &[u8] = b"?";
pub const CHUNK: u8 = b';';

/// Parse an integer from a byte slice
#[inline]
pub fn parse_integer(buf: &[u8]) -> Result<i64, ParseError> {
	let s = std::str::from_utf8(buf).map_err(|_| invalid_integer(buf))?;
	s.parse::<i64>().map_err(|_| invalid_integer(buf))
}

fn invalid_integer(buf: &[u8]) -> ParseError {
	ParseError::InvalidInteger(String::from_utf8_lossy(buf).into_owned())
}

/// Parse a double from a byte slice
#[inline]
pub fn parse_double(buf: &[u8]) -> Result<f64, ParseError> {
	let invalid = || ParseError::InvalidDouble(String::from_utf8_lossy(buf).into_owned());
	let s = std::str::from_utf8(buf).map_err(|_| invalid())?;

	// Handle special values
	match s {
		"inf" => Ok(f64::INFINITY),
		"-inf" => Ok(f64::NEG_INFINITY),
		"nan" | "-nan" => Ok(f64::NAN),
		_ => s.parse::<f64>().map_err(|_| invalid()),
	}
}

#[inline]
pub fn parse_boolean(buf: &[u8]) -> Result<bool, ParseError> {
	match buf {
		b"t" => Ok(true),
		b"f" => Ok(false),
		_ => Err(ParseError::InvalidBoolean(
			String::from_utf8_lossy(buf).into_owned(),
		)),
	}
}

/// Validate a big number: an optional sign followed by at least one digit.
#[inline]
pub fn parse_big_number(buf: &[u8]) -> Result<String, ParseError> {
	let digits = match buf.first() {
		Some(b'-') | Some(b'+') => &buf[1..],
		_ => buf,
	};
	if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
		return Err(ParseError::InvalidBigNumber(
			String::from_utf8_lossy(buf).into_owned(),
		));
	}
	// ASCII only, checked above
	Ok(buf.iter().map(|&b| b as char).collect())
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[test]
	fn test_parse_integer() {
		assert_eq!(parse_integer(b"123").unwrap(), 123);
		assert_eq!(parse_integer(b"-456").unwrap(), -456);
		assert!(parse_integer(b"abc").is_err());
		assert!(parse_integer(b"").is_err());
		assert!(parse_integer(b"9223372036854775808").is_err());
	}

	#[test]
	fn test_parse_double() {
		assert_eq!(parse_double(b"3.14").unwrap(), 3.14);
		assert_eq!(parse_double(b"-2.5").unwrap(), -2.5);
		assert_eq!(parse_double(b"10").unwrap(), 10.0);
		assert_eq!(parse_double(b"1e3").unwrap(), 1000.0);
		assert_eq!(parse_double(b"inf").unwrap(), f64::INFINITY);
		assert_eq!(parse_double(b"-inf").unwrap(), f64::NEG_INFINITY);
		assert!(parse_double(b"nan").unwrap().is_nan());
		assert!(parse_double(b"1.2.3").is_err());
	}

	#[rstest]
	#[case(b"t", Some(true))]
	#[case(b"f", Some(false))]
	#[case(b"true", None)]
	#[case(b"", None)]
	fn test_parse_boolean(#[case] input: &[u8], #[case] expected: Option<bool>) {
		assert_eq!(parse_boolean(input).ok(), expected);
	}

	#[rstest]
	#[case(b"3492890328409238509324850943850943825024385", true)]
	#[case(b"-12", true)]
	#[case(b"+7", true)]
	#[case(b"-", false)]
	#[case(b"12a", false)]
	#[case(b"", false)]
	fn test_parse_big_number(#[case] input: &[u8], #[case] valid: bool) {
		assert_eq!(parse_big_number(input).is_ok(), valid);
	}
}
