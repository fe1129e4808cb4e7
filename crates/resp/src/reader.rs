//! Blocking RESP3 reader.

use std::io;
use std::io::Read;
use std::io::Write;

use bytes::BytesMut;
use mempool::BufferPool;

use crate::assembler::Assembler;
use crate::assembler::Feed;
use crate::error::ParseError;
use crate::error::RespError;
use crate::header;
use crate::header::BlobLen;
use crate::header::Header;
use crate::options::ReaderOptions;
use crate::types::Blob;
use crate::types::Decode;
use crate::types::RespValue;
use crate::utils::BLOB_ERROR;
use crate::utils::BLOB_STRING;
use crate::utils::VERBATIM_STRING;

/// Where blob payload bytes go.
enum Sink<'a> {
	Pooled(&'a mut BytesMut),
	Writer(&'a mut dyn Write),
}

impl Sink<'_> {
	fn put(&mut self, chunk: &[u8]) -> Result<(), RespError> {
		match self {
			Sink::Pooled(acc) => {
				acc.extend_from_slice(chunk);
				Ok(())
			}
			Sink::Writer(w) => Ok(w.write_all(chunk)?),
		}
	}
}

/// Decodes RESP3 values from a blocking byte stream.
///
/// Reads one byte at a time for tags and lines, so `R` should be buffered
/// (a `transport::BufferedStream`, a `BufReader`, or an in-memory slice).
/// After an error the stream position is undefined; drop the connection.
pub struct Resp3Reader<R> {
	inner: R,
	pool: BufferPool,
	options: ReaderOptions,
}

impl<R: Read> Resp3Reader<R> {
	pub fn new(inner: R, pool: BufferPool) -> Self {
		Self::with_options(inner, pool, ReaderOptions::default())
	}

	pub fn with_options(inner: R, pool: BufferPool, options: ReaderOptions) -> Self {
		Self {
			inner,
			pool,
			options,
		}
	}

	pub fn get_ref(&self) -> &R {
		&self.inner
	}

	pub fn get_mut(&mut self) -> &mut R {
		&mut self.inner
	}

	pub fn into_inner(self) -> R {
		self.inner
	}

	pub fn options(&self) -> &ReaderOptions {
		&self.options
	}

	/// Read the next complete value.
	///
	/// A clean end of stream before the first byte is
	/// [`RespError::ConnectionClosed`].
	pub fn read_object(&mut self, decode: Decode) -> Result<RespValue, RespError> {
		let mut assembler = Assembler::new(self.options.max_depth);
		let mut line = self.pool.checkout_accumulator();
		loop {
			let Some(tag) = self.read_byte()? else {
				match assembler.eof()? {
					Feed::Done(value) => return Ok(value),
					Feed::More => continue,
				}
			};
			if tag == b' ' {
				continue;
			}
			line.clear();
			self.read_line(&mut line)?;
			let feed = match header::parse_header(tag, &line, &self.options)? {
				Header::Value(value) => assembler.value(value),
				Header::Blob { kind, len } => {
					let value = match len {
						BlobLen::Null => kind.null(),
						len => kind.build(self.read_blob(len, decode)?),
					};
					assembler.value(value)
				}
				Header::Aggregate { kind, len } => assembler.open(kind, len)?,
				Header::End => assembler.end()?,
			};
			if let Feed::Done(value) = feed {
				return Ok(value);
			}
		}
	}

	/// Stream the payload of the next blob string, blob error or verbatim
	/// string into `dest` without holding it in memory, copying through a
	/// scratch buffer of `buffer_size` bytes. A verbatim payload keeps its
	/// `fmt:` prefix.
	///
	/// Returns the number of bytes written, or `None` for a null blob.
	pub fn read_blob_string_chunk<W: Write>(&mut self, dest: &mut W, buffer_size: usize) -> Result<Option<u64>, RespError> {
		let tag = loop {
			match self.read_byte()? {
				None => return Err(RespError::ConnectionClosed),
				Some(b' ') => continue,
				Some(tag) => break tag,
			}
		};
		if !matches!(tag, BLOB_STRING | VERBATIM_STRING | BLOB_ERROR) {
			return Err(ParseError::ExpectedBlobString(tag).into());
		}
		let mut line = self.pool.checkout_accumulator();
		self.read_line(&mut line)?;
		match header::blob_len(&line, &self.options)? {
			BlobLen::Null => Ok(None),
			len => {
				let written = self.copy_blob(len, &mut Sink::Writer(&mut *dest), buffer_size)?;
				dest.flush()?;
				Ok(Some(written))
			}
		}
	}

	fn read_blob(&mut self, len: BlobLen, decode: Decode) -> Result<Blob, RespError> {
		let mut acc = self.pool.checkout_accumulator();
		let chunk_size = self.options.chunk_size;
		self.copy_blob(len, &mut Sink::Pooled(&mut *acc), chunk_size)?;
		Ok(Blob::from_slice(&acc, decode))
	}

	fn copy_blob(&mut self, len: BlobLen, sink: &mut Sink<'_>, chunk_size: usize) -> Result<u64, RespError> {
		match len {
			BlobLen::Null => Ok(0),
			BlobLen::Fixed(n) => {
				self.copy_exact(n, sink, chunk_size)?;
				self.expect_crlf()?;
				Ok(n as u64)
			}
			BlobLen::Streamed => {
				let mut total = 0u64;
				let mut line = self.pool.checkout_accumulator();
				loop {
					line.clear();
					self.read_line(&mut line)?;
					let n = header::chunk_len(&line)?;
					if n == 0 {
						return Ok(total);
					}
					total += n as u64;
					if total > self.options.max_blob_len as u64 {
						return Err(ParseError::BlobTooLarge {
							len: total,
							limit: self.options.max_blob_len,
						}
						.into());
					}
					self.copy_exact(n, sink, chunk_size)?;
					self.expect_crlf()?;
				}
			}
		}
	}

	fn copy_exact(&mut self, len: usize, sink: &mut Sink<'_>, chunk_size: usize) -> Result<(), RespError> {
		if len == 0 {
			return Ok(());
		}
		let step = chunk_size.max(1).min(len);
		let mut buf = self.pool.checkout_buffer(step);
		let mut remaining = len;
		while remaining > 0 {
			let take = remaining.min(step);
			self.read_exact(&mut buf[..take])?;
			sink.put(&buf[..take])?;
			remaining -= take;
		}
		Ok(())
	}

	fn read_exact(&mut self, mut buf: &mut [u8]) -> Result<(), RespError> {
		while !buf.is_empty() {
			match self.inner.read(buf) {
				Ok(0) => return Err(ParseError::UnexpectedEOF.into()),
				Ok(n) => buf = &mut buf[n..],
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e.into()),
			}
		}
		Ok(())
	}

	fn read_byte(&mut self) -> Result<Option<u8>, RespError> {
		let mut one = [0u8; 1];
		loop {
			match self.inner.read(&mut one) {
				Ok(0) => return Ok(None),
				Ok(_) => return Ok(Some(one[0])),
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e.into()),
			}
		}
	}

	/// Read up to CRLF, excluding it.
	fn read_line(&mut self, line: &mut BytesMut) -> Result<(), RespError> {
		loop {
			match self.read_byte()? {
				None => return Err(ParseError::UnexpectedEOF.into()),
				Some(b'\r') => {
					return match self.read_byte()? {
						Some(b'\n') => Ok(()),
						None => Err(ParseError::UnexpectedEOF.into()),
						Some(_) => Err(ParseError::InvalidLineTerminator.into()),
					};
				}
				Some(b) => {
					if line.len() >= self.options.max_line_len {
						return Err(ParseError::LineTooLong(self.options.max_line_len).into());
					}
					line.extend_from_slice(&[b]);
				}
			}
		}
	}

	fn expect_crlf(&mut self) -> Result<(), RespError> {
		match (self.read_byte()?, self.read_byte()?) {
			(Some(b'\r'), Some(b'\n')) => Ok(()),
			(None, _) | (_, None) => Err(ParseError::UnexpectedEOF.into()),
			_ => Err(ParseError::MissingBlobTerminator.into()),
		}
	}
}

impl<R> std::fmt::Debug for Resp3Reader<R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Resp3Reader")
			.field("options", &self.options)
			.finish()
	}
}
