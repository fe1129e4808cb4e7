//! Read-ahead buffering over a [`RawSocketStream`].
//!
//! Protocol readers ask for a byte or a handful of bytes at a time. Going to
//! the socket for each of those is wasteful, so reads are served from a
//! read-ahead buffer that is refilled by one socket read whenever it runs
//! dry. Writes are not buffered.

use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::task::ready;

use log::trace;
use mempool::BufferPool;
use mempool::PooledBuffer;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::ReadBuf;

use crate::config::StreamConfig;
use crate::error::TransportError;
use crate::raw::RawSocketStream;
use crate::socket::SocketIo;

/// A [`RawSocketStream`] with a read-ahead buffer.
///
/// Invariant: `offset + length <= capacity`, and the unread bytes are
/// `read_ahead[offset..offset + length]`. When read-ahead is disabled and the
/// buffer is empty, reads go straight to the socket.
pub struct BufferedStream<S> {
	raw: RawSocketStream<S>,
	read_ahead: PooledBuffer,
	capacity: usize,
	offset: usize,
	length: usize,
	buffered: bool,
	socket_reads: u64,
}

impl<S: SocketIo> BufferedStream<S> {
	pub fn new(raw: RawSocketStream<S>, pool: &BufferPool, config: StreamConfig) -> Self {
		let capacity = config.read_ahead_capacity.max(1);
		Self {
			raw,
			read_ahead: pool.checkout_buffer(capacity),
			capacity,
			offset: 0,
			length: 0,
			buffered: config.buffered,
			socket_reads: 0,
		}
	}

	pub fn get_ref(&self) -> &RawSocketStream<S> {
		&self.raw
	}

	pub fn get_mut(&mut self) -> &mut RawSocketStream<S> {
		&mut self.raw
	}

	/// Unwrap the raw stream. Buffered bytes that were never read are lost and
	/// the read-ahead buffer goes back to its pool.
	pub fn into_inner(self) -> RawSocketStream<S> {
		self.raw
	}

	pub fn is_buffered(&self) -> bool {
		self.buffered
	}

	/// Toggle read-ahead. Bytes already buffered are still served first.
	pub fn set_buffered(&mut self, buffered: bool) {
		self.buffered = buffered;
	}

	/// Bytes held in the read-ahead buffer and not yet handed out.
	pub fn buffered_len(&self) -> usize {
		self.length
	}

	/// Socket reads issued so far, refills and direct reads alike.
	pub fn socket_reads(&self) -> u64 {
		self.socket_reads
	}

	/// Read up to `dst.len()` bytes.
	///
	/// Buffered bytes are served first. Otherwise, with read-ahead on, one
	/// socket read refills the buffer; with it off, the socket read goes
	/// straight into `dst`. `Ok(0)` with a non-empty `dst` means end of
	/// stream.
	pub fn poll_read_into(&mut self, cx: &mut Context<'_>, dst: &mut [u8]) -> Poll<Result<usize, TransportError>> {
		if dst.is_empty() {
			return Poll::Ready(Ok(0));
		}
		if self.length == 0 {
			if !self.buffered {
				let n = ready!(self.raw.poll_read(cx, dst))?;
				self.socket_reads += 1;
				return Poll::Ready(Ok(n));
			}
			let capacity = self.capacity;
			let n = ready!(self.raw.poll_read(cx, &mut self.read_ahead[..capacity]))?;
			self.socket_reads += 1;
			self.offset = 0;
			self.length = n;
			trace!("read-ahead refilled with {} bytes", n);
			if n == 0 {
				return Poll::Ready(Ok(0));
			}
		}
		Poll::Ready(Ok(self.copy_out(dst)))
	}

	/// Read a single byte. `None` at end of stream.
	///
	/// An empty buffer is not refilled: the byte comes from a one-byte socket
	/// read.
	pub fn poll_read_byte(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<u8>, TransportError>> {
		if self.length > 0 {
			let byte = self.read_ahead[self.offset];
			self.offset += 1;
			self.length -= 1;
			return Poll::Ready(Ok(Some(byte)));
		}
		let mut one = [0u8; 1];
		let n = ready!(self.raw.poll_read(cx, &mut one))?;
		self.socket_reads += 1;
		Poll::Ready(Ok((n == 1).then_some(one[0])))
	}

	pub async fn read(&mut self, dst: &mut [u8]) -> Result<usize, TransportError> {
		poll_fn(|cx| self.poll_read_into(cx, dst)).await
	}

	pub async fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
		poll_fn(|cx| self.poll_read_byte(cx)).await
	}

	pub async fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
		self.raw.write(buf).await
	}

	pub async fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
		self.raw.write_all(buf).await
	}

	/// Blocking read. See [`RawSocketStream::read_blocking`] for the threading
	/// rules.
	pub fn read_blocking(&mut self, dst: &mut [u8]) -> Result<usize, TransportError> {
		futures::executor::block_on(self.read(dst))
	}

	pub fn read_byte_blocking(&mut self) -> Result<Option<u8>, TransportError> {
		futures::executor::block_on(self.read_byte())
	}

	pub fn write_blocking(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
		self.raw.write_blocking(buf)
	}

	pub fn write_all_blocking(&mut self, buf: &[u8]) -> Result<(), TransportError> {
		self.raw.write_all_blocking(buf)
	}

	fn copy_out(&mut self, dst: &mut [u8]) -> usize {
		let n = dst.len().min(self.length);
		dst[..n].copy_from_slice(&self.read_ahead[self.offset..self.offset + n]);
		self.offset += n;
		self.length -= n;
		n
	}
}

impl<S: SocketIo> io::Read for BufferedStream<S> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		Ok(self.read_blocking(buf)?)
	}
}

impl<S: SocketIo> io::Write for BufferedStream<S> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		Ok(self.write_blocking(buf)?)
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl<S: SocketIo> AsyncRead for BufferedStream<S> {
	fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
		let this = self.get_mut();
		// At most `length` bytes come out of the buffer, and at most
		// `capacity` out of one socket read.
		let want = if this.length > 0 { this.length } else { this.capacity };
		let n = ready!(this.poll_read_into(cx, buf.initialize_unfilled_to(want.min(buf.remaining()))))?;
		buf.advance(n);
		Poll::Ready(Ok(()))
	}
}

impl<S: SocketIo> AsyncWrite for BufferedStream<S> {
	fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
		let n = ready!(self.get_mut().raw.poll_write(cx, buf))?;
		Poll::Ready(Ok(n))
	}

	fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}

	fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}
}

impl<S> std::fmt::Debug for BufferedStream<S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BufferedStream")
			.field("capacity", &self.capacity)
			.field("offset", &self.offset)
			.field("length", &self.length)
			.field("buffered", &self.buffered)
			.finish()
	}
}
