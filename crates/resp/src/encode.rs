use std::io::Write;

use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use mempool::BufferPool;
use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;

use crate::error::RespError;
use crate::types::Blob;
use crate::types::MessageType;
use crate::types::RespValue;
use crate::utils::*;

/// Errors that can occur during RESP encoding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
	/// Invalid value for encoding
	#[error("Invalid value: {0}")]
	InvalidValue(String),
}

/// Trait for encoding RESP values.
pub trait RespEncoder {
	fn encode_to(&self, buf: &mut BytesMut) -> Result<(), EncodeError>;

	fn encode(&self) -> Result<Bytes, EncodeError> {
		let mut buf = BytesMut::new();
		self.encode_to(&mut buf)?;
		Ok(buf.freeze())
	}
}

impl RespEncoder for RespValue {
	fn encode_to(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
		match self {
			RespValue::Null => encode_null(buf),
			RespValue::TypedNull(kind) => encode_typed_null(buf, *kind)?,
			RespValue::SimpleString(s) => encode_line(buf, SIMPLE_STRING, s)?,
			RespValue::SimpleError(e) => encode_line(buf, SIMPLE_ERROR, e)?,
			RespValue::Number(i) => encode_number(buf, *i),
			RespValue::BigNumber(n) => encode_line(buf, BIG_NUMBER, n)?,
			RespValue::Double(d) => encode_double(buf, *d),
			RespValue::Boolean(b) => encode_boolean(buf, *b),
			RespValue::BlobString(b) => encode_blob(buf, BLOB_STRING, b),
			RespValue::BlobError(b) => encode_blob(buf, BLOB_ERROR, b),
			RespValue::VerbatimString(b) => encode_verbatim(buf, b)?,
			RespValue::Array(items) => encode_aggregate(buf, ARRAY, items)?,
			RespValue::Set(items) => encode_aggregate(buf, SET, items)?,
			RespValue::Push(items) => encode_aggregate(buf, PUSH, items)?,
			RespValue::Map(items) => encode_pairs(buf, MAP, items)?,
			RespValue::Attribute(items) => encode_pairs(buf, ATTRIBUTE, items)?,
		}
		Ok(())
	}
}

#[inline]
fn encode_length(buf: &mut BytesMut, marker: u8, length: usize) {
	buf.put_u8(marker);
	buf.put_slice(length.to_string().as_bytes());
	buf.put_slice(CRLF);
}

#[inline]
fn encode_null(buf: &mut BytesMut) {
	buf.put_u8(NULL);
	buf.put_slice(CRLF);
}

/// Blobs and aggregates carry null as a length of -1.
fn encode_typed_null(buf: &mut BytesMut, kind: MessageType) -> Result<(), EncodeError> {
	match kind {
		MessageType::Null => encode_null(buf),
		MessageType::BlobString
		| MessageType::BlobError
		| MessageType::VerbatimString
		| MessageType::Array
		| MessageType::Set
		| MessageType::Map
		| MessageType::Push
		| MessageType::Attribute => {
			buf.put_u8(kind.tag());
			buf.put_slice(b"-1");
			buf.put_slice(CRLF);
		}
		other => {
			return Err(EncodeError::InvalidValue(format!(
				"{:?} has no null form",
				other
			)));
		}
	}
	Ok(())
}

/// Line-framed values cannot carry CR or LF.
fn encode_line(buf: &mut BytesMut, marker: u8, s: &str) -> Result<(), EncodeError> {
	if s.contains(['\r', '\n']) {
		return Err(EncodeError::InvalidValue(format!(
			"line value contains CR or LF: {:?}",
			s
		)));
	}
	buf.put_u8(marker);
	buf.put_slice(s.as_bytes());
	buf.put_slice(CRLF);
	Ok(())
}

#[inline]
fn encode_number(buf: &mut BytesMut, i: i64) {
	buf.put_u8(NUMBER);
	buf.put_slice(i.to_string().as_bytes());
	buf.put_slice(CRLF);
}

#[inline]
fn encode_double(buf: &mut BytesMut, d: f64) {
	buf.put_u8(DOUBLE);
	if d.is_nan() {
		buf.put_slice(b"nan");
	} else if d.is_infinite() {
		if d.is_sign_positive() {
			buf.put_slice(b"inf");
		} else {
			buf.put_slice(b"-inf");
		}
	} else {
		buf.put_slice(d.to_string().as_bytes());
	}
	buf.put_slice(CRLF);
}

#[inline]
fn encode_boolean(buf: &mut BytesMut, b: bool) {
	buf.put_u8(BOOLEAN);
	buf.put_u8(if b { b't' } else { b'f' });
	buf.put_slice(CRLF);
}

#[inline]
fn encode_bytes(buf: &mut BytesMut, marker: u8, data: &[u8]) {
	encode_length(buf, marker, data.len());
	buf.put_slice(data);
	buf.put_slice(CRLF);
}

#[inline]
fn encode_blob(buf: &mut BytesMut, marker: u8, blob: &Blob) {
	encode_bytes(buf, marker, blob.as_bytes());
}

fn encode_verbatim(buf: &mut BytesMut, blob: &Blob) -> Result<(), EncodeError> {
	let data = blob.as_bytes();
	if data.len() < 4 || data[3] != b':' {
		return Err(EncodeError::InvalidValue(
			"verbatim string must start with a three byte format and ':'".to_string(),
		));
	}
	encode_bytes(buf, VERBATIM_STRING, data);
	Ok(())
}

fn encode_aggregate(buf: &mut BytesMut, marker: u8, items: &[RespValue]) -> Result<(), EncodeError> {
	encode_length(buf, marker, items.len());
	for value in items {
		value.encode_to(buf)?;
	}
	Ok(())
}

fn encode_pairs(buf: &mut BytesMut, marker: u8, items: &[RespValue]) -> Result<(), EncodeError> {
	if items.len() % 2 != 0 {
		return Err(EncodeError::InvalidValue(format!(
			"map holds an odd number of entries: {}",
			items.len()
		)));
	}
	encode_length(buf, marker, items.len() / 2);
	for value in items {
		value.encode_to(buf)?;
	}
	Ok(())
}

/// Frame a command as an array of blob strings.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A], buf: &mut BytesMut) {
	let body: usize = args.iter().map(|a| a.as_ref().len() + 16).sum();
	buf.reserve(body + 16);
	encode_length(buf, ARRAY, args.len());
	for arg in args {
		encode_bytes(buf, BLOB_STRING, arg.as_ref());
	}
}

/// Encode `args` into a pooled buffer and send it with a single write.
pub fn write_command<W, A>(writer: &mut W, pool: &BufferPool, args: &[A]) -> Result<(), RespError>
where
	W: Write + ?Sized,
	A: AsRef<[u8]>,
{
	let mut frame = pool.checkout_accumulator();
	encode_command(args, &mut frame);
	writer.write_all(&frame)?;
	writer.flush()?;
	Ok(())
}

/// Suspending counterpart of [`write_command`].
pub async fn write_command_async<W, A>(writer: &mut W, pool: &BufferPool, args: &[A]) -> Result<(), RespError>
where
	W: AsyncWrite + Unpin + ?Sized,
	A: AsRef<[u8]>,
{
	let mut frame = pool.checkout_accumulator();
	encode_command(args, &mut frame);
	writer.write_all(&frame).await?;
	writer.flush().await?;
	Ok(())
}
