//! Checkout guards. Each one hands its item back to the pool on drop.

use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;

use bytes::Bytes;
use bytes::BytesMut;

use crate::pool::PoolInner;

/// A byte buffer leased from a [`BufferPool`](crate::BufferPool).
pub struct PooledBuffer {
	buf: Option<Box<[u8]>>,
	class: Option<usize>,
	pool: Arc<PoolInner>,
}

impl PooledBuffer {
	pub(crate) fn new(buf: Box<[u8]>, class: Option<usize>, pool: Arc<PoolInner>) -> Self {
		Self {
			buf: Some(buf),
			class,
			pool,
		}
	}
}

impl Deref for PooledBuffer {
	type Target = [u8];

	fn deref(&self) -> &[u8] {
		self.buf.as_deref().unwrap_or_default()
	}
}

impl DerefMut for PooledBuffer {
	fn deref_mut(&mut self) -> &mut [u8] {
		self.buf.as_deref_mut().unwrap_or_default()
	}
}

impl Drop for PooledBuffer {
	fn drop(&mut self) {
		if let Some(buf) = self.buf.take() {
			self.pool.return_buffer(buf, self.class);
		}
	}
}

impl std::fmt::Debug for PooledBuffer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PooledBuffer")
			.field("len", &self.len())
			.field("class", &self.class)
			.finish()
	}
}

/// A growable byte accumulator leased from a [`BufferPool`](crate::BufferPool).
pub struct PooledAccumulator {
	buf: Option<BytesMut>,
	pool: Arc<PoolInner>,
}

impl PooledAccumulator {
	pub(crate) fn new(buf: BytesMut, pool: Arc<PoolInner>) -> Self {
		Self {
			buf: Some(buf),
			pool,
		}
	}

	/// Copy the accumulated bytes out. The accumulator itself stays leased
	/// and goes back to the pool when dropped.
	pub fn to_bytes(&self) -> Bytes {
		Bytes::copy_from_slice(self)
	}
}

impl Deref for PooledAccumulator {
	type Target = BytesMut;

	fn deref(&self) -> &BytesMut {
		// Only `drop` takes the buffer out.
		match &self.buf {
			Some(buf) => buf,
			None => unreachable!("accumulator used after release"),
		}
	}
}

impl DerefMut for PooledAccumulator {
	fn deref_mut(&mut self) -> &mut BytesMut {
		match &mut self.buf {
			Some(buf) => buf,
			None => unreachable!("accumulator used after release"),
		}
	}
}

impl Drop for PooledAccumulator {
	fn drop(&mut self) {
		if let Some(buf) = self.buf.take() {
			self.pool.return_accumulator(buf);
		}
	}
}

/// A text builder leased from a [`BufferPool`](crate::BufferPool).
pub struct PooledText {
	text: Option<String>,
	pool: Arc<PoolInner>,
}

impl PooledText {
	pub(crate) fn new(text: String, pool: Arc<PoolInner>) -> Self {
		Self {
			text: Some(text),
			pool,
		}
	}
}

impl Deref for PooledText {
	type Target = String;

	fn deref(&self) -> &String {
		match &self.text {
			Some(text) => text,
			None => unreachable!("text builder used after release"),
		}
	}
}

impl DerefMut for PooledText {
	fn deref_mut(&mut self) -> &mut String {
		match &mut self.text {
			Some(text) => text,
			None => unreachable!("text builder used after release"),
		}
	}
}

impl Drop for PooledText {
	fn drop(&mut self) {
		if let Some(text) = self.text.take() {
			self.pool.return_text(text);
		}
	}
}
