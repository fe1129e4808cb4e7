//! Suspending RESP3 reader.
//!
//! Same decoding as [`Resp3Reader`](crate::Resp3Reader), but every read
//! suspends instead of blocking. Both readers feed the same assembler, so a
//! given byte sequence decodes to the same value either way.

use std::io;

use bytes::BytesMut;
use mempool::BufferPool;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;

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

enum AsyncSink<'a, W: ?Sized> {
	Pooled(&'a mut BytesMut),
	Writer(&'a mut W),
}

impl<W: AsyncWrite + Unpin + ?Sized> AsyncSink<'_, W> {
	async fn put(&mut self, chunk: &[u8]) -> Result<(), RespError> {
		match self {
			AsyncSink::Pooled(acc) => {
				acc.extend_from_slice(chunk);
				Ok(())
			}
			AsyncSink::Writer(w) => Ok(w.write_all(chunk).await?),
		}
	}
}

/// Decodes RESP3 values from an async byte stream.
///
/// Not cancel safe: dropping a pending `read_object` loses the bytes it had
/// already consumed, so the connection must be discarded afterwards.
pub struct AsyncResp3Reader<R> {
	inner: R,
	pool: BufferPool,
	options: ReaderOptions,
}

impl<R: AsyncRead + Unpin> AsyncResp3Reader<R> {
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
	pub async fn read_object(&mut self, decode: Decode) -> Result<RespValue, RespError> {
		let mut assembler = Assembler::new(self.options.max_depth);
		let mut line = self.pool.checkout_accumulator();
		loop {
			let Some(tag) = self.read_byte().await? else {
				match assembler.eof()? {
					Feed::Done(value) => return Ok(value),
					Feed::More => continue,
				}
			};
			if tag == b' ' {
				continue;
			}
			line.clear();
			self.read_line(&mut line).await?;
			let feed = match header::parse_header(tag, &line, &self.options)? {
				Header::Value(value) => assembler.value(value),
				Header::Blob { kind, len } => {
					let value = match len {
						BlobLen::Null => kind.null(),
						len => kind.build(self.read_blob(len, decode).await?),
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

	/// Stream the payload of the next blob string into `dest`. See
	/// [`Resp3Reader::read_blob_string_chunk`](crate::Resp3Reader::read_blob_string_chunk).
	pub async fn read_blob_string_chunk<W>(&mut self, dest: &mut W, buffer_size: usize) -> Result<Option<u64>, RespError>
	where
		W: AsyncWrite + Unpin + ?Sized,
	{
		let tag = loop {
			match self.read_byte().await? {
				None => return Err(RespError::ConnectionClosed),
				Some(b' ') => continue,
				Some(tag) => break tag,
			}
		};
		if !matches!(tag, BLOB_STRING | VERBATIM_STRING | BLOB_ERROR) {
			return Err(ParseError::ExpectedBlobString(tag).into());
		}
		let mut line = self.pool.checkout_accumulator();
		self.read_line(&mut line).await?;
		match header::blob_len(&line, &self.options)? {
			BlobLen::Null => Ok(None),
			len => {
				let written = self
					.copy_blob(len, &mut AsyncSink::Writer(&mut *dest), buffer_size)
					.await?;
				dest.flush().await?;
				Ok(Some(written))
			}
		}
	}

	async fn read_blob(&mut self, len: BlobLen, decode: Decode) -> Result<Blob, RespError> {
		let mut acc = self.pool.checkout_accumulator();
		let chunk_size = self.options.chunk_size;
		let mut sink = AsyncSink::<tokio::io::Sink>::Pooled(&mut *acc);
		self.copy_blob(len, &mut sink, chunk_size).await?;
		Ok(Blob::from_slice(&acc, decode))
	}

	async fn copy_blob<W>(&mut self, len: BlobLen, sink: &mut AsyncSink<'_, W>, chunk_size: usize) -> Result<u64, RespError>
	where
		W: AsyncWrite + Unpin + ?Sized,
	{
		match len {
			BlobLen::Null => Ok(0),
			BlobLen::Fixed(n) => {
				self.copy_exact(n, sink, chunk_size).await?;
				self.expect_crlf().await?;
				Ok(n as u64)
			}
			BlobLen::Streamed => {
				let mut total = 0u64;
				let mut line = self.pool.checkout_accumulator();
				loop {
					line.clear();
					self.read_line(&mut line).await?;
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
					self.copy_exact(n, sink, chunk_size).await?;
					self.expect_crlf().await?;
				}
			}
		}
	}

	async fn copy_exact<W>(&mut self, len: usize, sink: &mut AsyncSink<'_, W>, chunk_size: usize) -> Result<(), RespError>
	where
		W: AsyncWrite + Unpin + ?Sized,
	{
		if len == 0 {
			return Ok(());
		}
		let step = chunk_size.max(1).min(len);
		let mut buf = self.pool.checkout_buffer(step);
		let mut remaining = len;
		while remaining > 0 {
			let take = remaining.min(step);
			match self.inner.read_exact(&mut buf[..take]).await {
				Ok(_) => {}
				Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
					return Err(ParseError::UnexpectedEOF.into());
				}
				Err(e) => return Err(e.into()),
			}
			sink.put(&buf[..take]).await?;
			remaining -= take;
		}
		Ok(())
	}

	async fn read_byte(&mut self) -> Result<Option<u8>, RespError> {
		let mut one = [0u8; 1];
		loop {
			match self.inner.read(&mut one).await {
				Ok(0) => return Ok(None),
				Ok(_) => return Ok(Some(one[0])),
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e.into()),
			}
		}
	}

	async fn read_line(&mut self, line: &mut BytesMut) -> Result<(), RespError> {
		loop {
			match self.read_byte().await? {
				None => return Err(ParseError::UnexpectedEOF.into()),
				Some(b'\r') => {
					return match self.read_byte().await? {
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

	async fn expect_crlf(&mut self) -> Result<(), RespError> {
		let cr = self.read_byte().await?;
		let lf = self.read_byte().await?;
		match (cr, lf) {
			(Some(b'\r'), Some(b'\n')) => Ok(()),
			(None, _) | (_, None) => Err(ParseError::UnexpectedEOF.into()),
			_ => Err(ParseError::MissingBlobTerminator.into()),
		}
	}
}

impl<R> std::fmt::Debug for AsyncResp3Reader<R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AsyncResp3Reader")
			.field("options", &self.options)
			.finish()
	}
}
