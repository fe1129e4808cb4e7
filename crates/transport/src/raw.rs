//! Unbuffered socket stream.
//!
//! Every read and write leases an [`OperationSlot`](crate::OperationSlot)
//! for its duration. Operations come in three flavours over the same path:
//!
//! - suspending: [`RawSocketStream::read`] / [`RawSocketStream::write`]
//!   (and their `poll_*` forms),
//! - blocking: [`RawSocketStream::read_blocking`] and friends,
//! - begin/end: [`RawSocketStream::begin_read`] returns a [`Completion`]
//!   that [`RawSocketStream::end_read`] waits on.

use std::future::poll_fn;
use std::io;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;
use std::task::ready;

use bytes::Bytes;
use bytes::BytesMut;
use log::trace;

use crate::completion::Completion;
use crate::error::Operation;
use crate::error::TransportError;
use crate::slot::LeasedSlot;
use crate::slot::SlotPool;
use crate::slot::Transfer;
use crate::socket::SocketIo;

/// Back-to-back synchronous completions allowed before a suspending
/// operation yields to the scheduler once.
pub const SYNC_COMPLETION_BUDGET: u32 = 64;

/// Result of a finished [`RawSocketStream::begin_read`]: the buffer handed in
/// and how many bytes at its front were filled.
#[derive(Debug)]
pub struct ReadDone {
	pub buf: BytesMut,
	pub bytes: usize,
}

impl ReadDone {
	pub fn filled(&self) -> &[u8] {
		&self.buf[..self.bytes]
	}
}

pub struct RawSocketStream<S> {
	socket: Arc<S>,
	slots: SlotPool,
	read_slot: Option<LeasedSlot>,
	write_slot: Option<LeasedSlot>,
	sync_streak: u32,
}

impl<S: SocketIo> RawSocketStream<S> {
	pub fn new(socket: S, slots: SlotPool) -> Self {
		Self::from_shared(Arc::new(socket), slots)
	}

	pub fn from_shared(socket: Arc<S>, slots: SlotPool) -> Self {
		Self {
			socket,
			slots,
			read_slot: None,
			write_slot: None,
			sync_streak: 0,
		}
	}

	pub fn socket(&self) -> &S {
		&self.socket
	}

	pub fn slots(&self) -> &SlotPool {
		&self.slots
	}

	/// Read up to `buf.len()` bytes. `Ok(0)` means the peer closed the
	/// connection (or `buf` is empty).
	///
	/// A `Pending` read keeps its slot; it must be polled again until ready.
	pub fn poll_read(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<Result<usize, TransportError>> {
		if self.read_slot.is_none() && self.should_yield(cx) {
			return Poll::Pending;
		}
		let slots = &self.slots;
		let slot = self.read_slot.get_or_insert_with(|| slots.acquire());
		let transfer = ready!(slot.poll_read(&*self.socket, cx, buf));
		self.read_slot = None;
		Poll::Ready(self.settle(transfer))
	}

	/// Write up to `buf.len()` bytes, returning how many were accepted.
	pub fn poll_write(&mut self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, TransportError>> {
		if self.write_slot.is_none() && self.should_yield(cx) {
			return Poll::Pending;
		}
		let slots = &self.slots;
		let slot = self.write_slot.get_or_insert_with(|| slots.acquire());
		let transfer = ready!(slot.poll_write(&*self.socket, cx, buf));
		self.write_slot = None;
		Poll::Ready(self.settle(transfer))
	}

	pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
		poll_fn(|cx| self.poll_read(cx, buf)).await
	}

	pub async fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
		poll_fn(|cx| self.poll_write(cx, buf)).await
	}

	pub async fn write_all(&mut self, mut buf: &[u8]) -> Result<(), TransportError> {
		while !buf.is_empty() {
			let n = self.write(buf).await?;
			if n == 0 {
				return Err(write_zero());
			}
			buf = &buf[n..];
		}
		Ok(())
	}

	/// Blocking read.
	///
	/// Parks the calling thread until the socket is readable. The socket still
	/// needs a live tokio reactor, so this must run off the runtime's worker
	/// threads (for example inside `spawn_blocking`).
	pub fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
		futures::executor::block_on(self.read(buf))
	}

	/// Blocking write. Same threading rules as [`read_blocking`](Self::read_blocking).
	pub fn write_blocking(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
		futures::executor::block_on(self.write(buf))
	}

	pub fn write_all_blocking(&mut self, buf: &[u8]) -> Result<(), TransportError> {
		futures::executor::block_on(self.write_all(buf))
	}

	fn should_yield(&mut self, cx: &mut Context<'_>) -> bool {
		if self.sync_streak < SYNC_COMPLETION_BUDGET {
			return false;
		}
		trace!(
			"{} synchronous socket completions in a row, yielding",
			self.sync_streak
		);
		self.sync_streak = 0;
		cx.waker().wake_by_ref();
		true
	}

	fn settle(&mut self, transfer: Transfer) -> Result<usize, TransportError> {
		if transfer.completed_synchronously {
			self.sync_streak += 1;
		} else {
			self.sync_streak = 0;
		}
		into_result(transfer)
	}
}

impl<S: SocketIo + 'static> RawSocketStream<S> {
	/// Start a read into `buf` (the whole slice, up to its current length).
	///
	/// If the socket already has data the returned completion is settled
	/// before this returns and reports
	/// [`CompletionState::CompletedSync`](crate::CompletionState::CompletedSync).
	/// Otherwise the read continues on a task of the current tokio runtime.
	pub fn begin_read(&self, mut buf: BytesMut) -> Completion<ReadDone> {
		let mut slot = self.slots.acquire();
		if let Some(transfer) = slot.try_read_inline(&*self.socket, &mut buf) {
			return Completion::ready(into_result(transfer).map(|bytes| ReadDone { buf, bytes }));
		}

		let handle = match tokio::runtime::Handle::try_current() {
			Ok(handle) => handle,
			Err(_) => return Completion::ready(Err(TransportError::NoRuntime)),
		};
		let (completer, completion) = Completion::pending();
		let socket = self.socket.clone();
		handle.spawn(async move {
			let transfer = poll_fn(|cx| slot.poll_read(&*socket, cx, &mut buf)).await;
			drop(slot);
			completer.settle(into_result(transfer).map(|bytes| ReadDone { buf, bytes }));
		});
		completion
	}

	/// Wait for a read started with [`begin_read`](Self::begin_read).
	pub fn end_read(&self, completion: Completion<ReadDone>) -> Result<ReadDone, TransportError> {
		completion.wait()
	}

	/// Start writing all of `buf`. The completion yields the number of bytes
	/// written, which equals `buf.len()` on success.
	pub fn begin_write(&self, buf: Bytes) -> Completion<usize> {
		let mut slot = self.slots.acquire();
		let mut written = 0;
		while written < buf.len() {
			match slot.try_write_inline(&*self.socket, &buf[written..]) {
				Some(transfer) => match into_result(transfer) {
					Ok(0) => return Completion::ready(Err(write_zero())),
					Ok(n) => written += n,
					Err(e) => return Completion::ready(Err(e)),
				},
				None => break,
			}
		}
		if written == buf.len() {
			return Completion::ready(Ok(written));
		}

		let handle = match tokio::runtime::Handle::try_current() {
			Ok(handle) => handle,
			Err(_) => return Completion::ready(Err(TransportError::NoRuntime)),
		};
		let (completer, completion) = Completion::pending();
		let socket = self.socket.clone();
		handle.spawn(async move {
			while written < buf.len() {
				let transfer = poll_fn(|cx| slot.poll_write(&*socket, cx, &buf[written..])).await;
				match into_result(transfer) {
					Ok(0) => return completer.fail(write_zero()),
					Ok(n) => written += n,
					Err(e) => return completer.fail(e),
				}
			}
			drop(slot);
			completer.complete(written);
		});
		completion
	}

	/// Wait for a write started with [`begin_write`](Self::begin_write).
	pub fn end_write(&self, completion: Completion<usize>) -> Result<usize, TransportError> {
		completion.wait()
	}
}

impl<S> std::fmt::Debug for RawSocketStream<S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RawSocketStream")
			.field("read_in_flight", &self.read_slot.is_some())
			.field("write_in_flight", &self.write_slot.is_some())
			.field("sync_streak", &self.sync_streak)
			.finish()
	}
}

fn into_result(transfer: Transfer) -> Result<usize, TransportError> {
	let op = transfer.op;
	transfer
		.result
		.map_err(|source| TransportError::io(op, source))
}

fn write_zero() -> TransportError {
	TransportError::io(
		Operation::Write,
		io::Error::new(io::ErrorKind::WriteZero, "socket accepted zero bytes"),
	)
}
