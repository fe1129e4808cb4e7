//! RESP3 data types and value representation.

use std::fmt;

use bytes::Bytes;

use crate::utils;

/// How blob payloads are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decode {
	/// Keep payloads as raw bytes.
	#[default]
	Raw,
	/// Decode payloads as UTF-8 text. Invalid sequences become U+FFFD.
	Utf8,
}

/// Payload of a blob string, blob error or verbatim string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Blob {
	Raw(Bytes),
	Text(String),
}

impl Blob {
	pub(crate) fn from_slice(data: &[u8], decode: Decode) -> Self {
		match decode {
			Decode::Raw => Blob::Raw(Bytes::copy_from_slice(data)),
			Decode::Utf8 => Blob::Text(String::from_utf8_lossy(data).into_owned()),
		}
	}

	pub fn as_bytes(&self) -> &[u8] {
		match self {
			Blob::Raw(b) => b,
			Blob::Text(s) => s.as_bytes(),
		}
	}

	/// The payload as text, if it is valid UTF-8.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Blob::Raw(b) => std::str::from_utf8(b).ok(),
			Blob::Text(s) => Some(s),
		}
	}

	pub fn len(&self) -> usize {
		self.as_bytes().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl From<&str> for Blob {
	fn from(s: &str) -> Self {
		Blob::Text(s.to_string())
	}
}

impl From<String> for Blob {
	fn from(s: String) -> Self {
		Blob::Text(s)
	}
}

impl From<Bytes> for Blob {
	fn from(b: Bytes) -> Self {
		Blob::Raw(b)
	}
}

impl From<&[u8]> for Blob {
	fn from(b: &[u8]) -> Self {
		Blob::Raw(Bytes::copy_from_slice(b))
	}
}

/// Wire type of a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
	SimpleString,
	SimpleError,
	BlobString,
	BlobError,
	VerbatimString,
	Number,
	BigNumber,
	Double,
	Boolean,
	Null,
	Array,
	Set,
	Map,
	Push,
	Attribute,
}

impl MessageType {
	/// The tag byte that introduces this type on the wire.
	pub fn tag(self) -> u8 {
		match self {
			MessageType::SimpleString => utils::SIMPLE_STRING,
			MessageType::SimpleError => utils::SIMPLE_ERROR,
			MessageType::BlobString => utils::BLOB_STRING,
			MessageType::BlobError => utils::BLOB_ERROR,
			MessageType::VerbatimString => utils::VERBATIM_STRING,
			MessageType::Number => utils::NUMBER,
			MessageType::BigNumber => utils::BIG_NUMBER,
			MessageType::Double => utils::DOUBLE,
			MessageType::Boolean => utils::BOOLEAN,
			MessageType::Null => utils::NULL,
			MessageType::Array => utils::ARRAY,
			MessageType::Set => utils::SET,
			MessageType::Map => utils::MAP,
			MessageType::Push => utils::PUSH,
			MessageType::Attribute => utils::ATTRIBUTE,
		}
	}
}

/// Represents a RESP3 protocol value.
///
/// Sets, maps and attributes keep wire order. Maps and attributes are
/// flattened into alternating key / value entries and may repeat keys.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
	/// Null: `_\r\n`
	Null,

	/// A negative length on a blob or aggregate (`$-1\r\n`, `*-1\r\n`),
	/// keeping the type it was declared with
	TypedNull(MessageType),

	/// Simple string: `+OK\r\n`
	SimpleString(String),

	/// Simple error: `-ERR message\r\n`
	SimpleError(String),

	/// Blob string: `$6\r\nfoobar\r\n`
	BlobString(Blob),

	/// Blob error: `!21\r\nSYNTAX invalid syntax\r\n`
	BlobError(Blob),

	/// Verbatim string: `=15\r\ntxt:Some string\r\n`, payload kept whole
	VerbatimString(Blob),

	/// Number: `:1000\r\n`
	Number(i64),

	/// Big number: `(3492890328409238509324850943850943825024385\r\n`
	BigNumber(String),

	/// Double: `,3.14\r\n`
	Double(f64),

	/// Boolean: `#t\r\n` or `#f\r\n`
	Boolean(bool),

	/// Array: `*2\r\n:1\r\n:2\r\n`
	Array(Vec<RespValue>),

	/// Set: `~2\r\n+a\r\n+b\r\n`
	Set(Vec<RespValue>),

	/// Map: `%1\r\n+key\r\n:1\r\n`, as `[key, value, ...]`
	Map(Vec<RespValue>),

	/// Push: `>2\r\n+message\r\n+hello\r\n`
	Push(Vec<RespValue>),

	/// Attribute: `|1\r\n+ttl\r\n:3600\r\n`, as `[key, value, ...]`
	Attribute(Vec<RespValue>),
}

impl RespValue {
	pub fn message_type(&self) -> MessageType {
		match self {
			RespValue::Null => MessageType::Null,
			RespValue::TypedNull(kind) => *kind,
			RespValue::SimpleString(_) => MessageType::SimpleString,
			RespValue::SimpleError(_) => MessageType::SimpleError,
			RespValue::BlobString(_) => MessageType::BlobString,
			RespValue::BlobError(_) => MessageType::BlobError,
			RespValue::VerbatimString(_) => MessageType::VerbatimString,
			RespValue::Number(_) => MessageType::Number,
			RespValue::BigNumber(_) => MessageType::BigNumber,
			RespValue::Double(_) => MessageType::Double,
			RespValue::Boolean(_) => MessageType::Boolean,
			RespValue::Array(_) => MessageType::Array,
			RespValue::Set(_) => MessageType::Set,
			RespValue::Map(_) => MessageType::Map,
			RespValue::Push(_) => MessageType::Push,
			RespValue::Attribute(_) => MessageType::Attribute,
		}
	}

	/// Check if the value is an error
	pub fn is_error(&self) -> bool {
		matches!(self, RespValue::SimpleError(_) | RespValue::BlobError(_))
	}

	/// Check if the value is null
	pub fn is_null(&self) -> bool {
		matches!(self, RespValue::Null | RespValue::TypedNull(_))
	}

	/// Textual content of string-like values.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			RespValue::SimpleString(s) | RespValue::SimpleError(s) | RespValue::BigNumber(s) => {
				Some(s)
			}
			RespValue::BlobString(b) | RespValue::BlobError(b) | RespValue::VerbatimString(b) => {
				b.as_str()
			}
			_ => None,
		}
	}

	/// Raw content of string-like values.
	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			RespValue::SimpleString(s) | RespValue::SimpleError(s) | RespValue::BigNumber(s) => {
				Some(s.as_bytes())
			}
			RespValue::BlobString(b) | RespValue::BlobError(b) | RespValue::VerbatimString(b) => {
				Some(b.as_bytes())
			}
			_ => None,
		}
	}

	pub fn as_integer(&self) -> Option<i64> {
		match self {
			RespValue::Number(i) => Some(*i),
			_ => None,
		}
	}

	pub fn as_double(&self) -> Option<f64> {
		match self {
			RespValue::Double(d) => Some(*d),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			RespValue::Boolean(b) => Some(*b),
			_ => None,
		}
	}

	/// Elements of any aggregate. Maps and attributes yield their flattened
	/// entries.
	pub fn as_array(&self) -> Option<&[RespValue]> {
		match self {
			RespValue::Array(items)
			| RespValue::Set(items)
			| RespValue::Map(items)
			| RespValue::Push(items)
			| RespValue::Attribute(items) => Some(items),
			_ => None,
		}
	}

	/// Key / value pairs of a map or attribute, in wire order.
	pub fn map_pairs(&self) -> Option<impl Iterator<Item = (&RespValue, &RespValue)>> {
		match self {
			RespValue::Map(items) | RespValue::Attribute(items) => {
				Some(items.chunks_exact(2).map(|pair| (&pair[0], &pair[1])))
			}
			_ => None,
		}
	}

	/// Split a verbatim string into its three-letter format and its body.
	pub fn verbatim_parts(&self) -> Option<(&[u8], &[u8])> {
		match self {
			RespValue::VerbatimString(b) => {
				let data = b.as_bytes();
				if data.len() >= 4 && data[3] == b':' {
					Some((&data[..3], &data[4..]))
				} else {
					None
				}
			}
			_ => None,
		}
	}

	/// Try to consume and convert to Vec<RespValue>
	pub fn into_vec(self) -> Option<Vec<RespValue>> {
		match self {
			RespValue::Array(items)
			| RespValue::Set(items)
			| RespValue::Map(items)
			| RespValue::Push(items)
			| RespValue::Attribute(items) => Some(items),
			_ => None,
		}
	}

	// Convenience constructors

	pub fn simple_string(s: impl Into<String>) -> Self {
		RespValue::SimpleString(s.into())
	}

	pub fn simple_error(s: impl Into<String>) -> Self {
		RespValue::SimpleError(s.into())
	}

	pub fn blob(b: impl Into<Blob>) -> Self {
		RespValue::BlobString(b.into())
	}

	/// Create an array value from an iterator
	pub fn array(items: impl IntoIterator<Item = RespValue>) -> Self {
		RespValue::Array(items.into_iter().collect())
	}
}

impl From<&str> for RespValue {
	fn from(s: &str) -> Self {
		RespValue::BlobString(Blob::from(s))
	}
}

impl From<String> for RespValue {
	fn from(s: String) -> Self {
		RespValue::BlobString(Blob::Text(s))
	}
}

impl From<Bytes> for RespValue {
	fn from(b: Bytes) -> Self {
		RespValue::BlobString(Blob::Raw(b))
	}
}

impl From<i64> for RespValue {
	fn from(i: i64) -> Self {
		RespValue::Number(i)
	}
}

impl From<bool> for RespValue {
	fn from(b: bool) -> Self {
		RespValue::Boolean(b)
	}
}

impl From<f64> for RespValue {
	fn from(d: f64) -> Self {
		RespValue::Double(d)
	}
}

impl<T: Into<RespValue>> From<Option<T>> for RespValue {
	fn from(o: Option<T>) -> Self {
		match o {
			Some(v) => v.into(),
			None => RespValue::Null,
		}
	}
}

/// Renders values the way an interactive client would show a reply.
impl fmt::Display for RespValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		render(self, f, 0)
	}
}

fn render(value: &RespValue, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
	match value {
		RespValue::Null | RespValue::TypedNull(_) => f.write_str("(nil)"),
		RespValue::SimpleString(s) => f.write_str(s),
		RespValue::SimpleError(s) => write!(f, "(error) {}", s),
		RespValue::BlobString(b) => write!(f, "{:?}", String::from_utf8_lossy(b.as_bytes())),
		RespValue::BlobError(b) => write!(f, "(error) {}", String::from_utf8_lossy(b.as_bytes())),
		RespValue::VerbatimString(b) => match value.verbatim_parts() {
			Some((_, body)) => f.write_str(&String::from_utf8_lossy(body)),
			None => f.write_str(&String::from_utf8_lossy(b.as_bytes())),
		},
		RespValue::Number(i) => write!(f, "(integer) {}", i),
		RespValue::BigNumber(n) => write!(f, "(big number) {}", n),
		RespValue::Double(d) => write!(f, "(double) {}", d),
		RespValue::Boolean(b) => write!(f, "({})", b),
		RespValue::Map(items) | RespValue::Attribute(items) => {
			if items.is_empty() {
				return f.write_str("(empty hash)");
			}
			for (i, pair) in items.chunks(2).enumerate() {
				if i > 0 {
					write!(f, "\n{:indent$}", "", indent = indent)?;
				}
				let prefix = format!("{}# ", i + 1);
				f.write_str(&prefix)?;
				render(&pair[0], f, indent + prefix.len())?;
				if let Some(v) = pair.get(1) {
					f.write_str(" => ")?;
					render(v, f, indent + prefix.len())?;
				}
			}
			Ok(())
		}
		RespValue::Array(items) | RespValue::Set(items) | RespValue::Push(items) => {
			if items.is_empty() {
				return f.write_str("(empty array)");
			}
			for (i, item) in items.iter().enumerate() {
				if i > 0 {
					write!(f, "\n{:indent$}", "", indent = indent)?;
				}
				let prefix = format!("{}) ", i + 1);
				f.write_str(&prefix)?;
				render(item, f, indent + prefix.len())?;
			}
			Ok(())
		}
	}
}
