//! Reusable operation descriptors.
//!
//! Every socket read or write is driven through an [`OperationSlot`] leased
//! from a [`SlotPool`]. A slot tracks the one operation it carries: its
//! direction, the requested length, and whether it ever had to wait for
//! readiness. The lease hands the slot back, reset, when it is dropped.

use std::io;
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;

use crossbeam_queue::SegQueue;
use log::debug;

use crate::error::Operation;
use crate::socket::SocketIo;

/// Outcome of one operation carried by a slot.
#[derive(Debug)]
pub struct Transfer {
	pub op: Operation,
	pub result: io::Result<usize>,
	/// True when the OS finished the operation without the slot ever
	/// waiting for readiness.
	pub completed_synchronously: bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingOp {
	op: Operation,
	requested: usize,
	suspended: bool,
}

#[derive(Debug)]
pub struct OperationSlot {
	id: u64,
	pending: Option<PendingOp>,
	token: Option<u64>,
	transfers: u64,
}

impl OperationSlot {
	fn new(id: u64) -> Self {
		Self {
			id,
			pending: None,
			token: None,
			transfers: 0,
		}
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	/// Caller-defined tag for the operation in flight. Cleared on release.
	pub fn token(&self) -> Option<u64> {
		self.token
	}

	pub fn set_token(&mut self, token: u64) {
		self.token = Some(token);
	}

	/// No operation is in flight on this slot.
	pub fn is_idle(&self) -> bool {
		self.pending.is_none()
	}

	/// Length requested by the operation in flight.
	pub fn requested(&self) -> Option<usize> {
		self.pending.map(|p| p.requested)
	}

	/// Operations completed over the slot's whole life, across leases.
	pub fn transfers(&self) -> u64 {
		self.transfers
	}

	/// Drive a read into `buf`.
	///
	/// Returns `Pending` after registering `cx` for read readiness. The caller
	/// must poll again until `Ready`; a retry may pass a different buffer, and
	/// [`requested`](Self::requested) follows the latest one.
	pub fn poll_read<S>(&mut self, socket: &S, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<Transfer>
	where
		S: SocketIo + ?Sized,
	{
		self.arm(Operation::Read, buf.len());
		loop {
			match socket.try_read(buf) {
				Ok(n) => return Poll::Ready(self.finish(Ok(n))),
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Poll::Ready(self.finish(Err(e))),
			}
			match socket.poll_read_ready(cx) {
				Poll::Ready(Ok(())) => continue,
				Poll::Ready(Err(e)) => return Poll::Ready(self.finish(Err(e))),
				Poll::Pending => {
					self.suspend();
					return Poll::Pending;
				}
			}
		}
	}

	/// Drive a write of `buf`. Same contract as [`poll_read`](Self::poll_read).
	pub fn poll_write<S>(&mut self, socket: &S, cx: &mut Context<'_>, buf: &[u8]) -> Poll<Transfer>
	where
		S: SocketIo + ?Sized,
	{
		self.arm(Operation::Write, buf.len());
		loop {
			match socket.try_write(buf) {
				Ok(n) => return Poll::Ready(self.finish(Ok(n))),
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Poll::Ready(self.finish(Err(e))),
			}
			match socket.poll_write_ready(cx) {
				Poll::Ready(Ok(())) => continue,
				Poll::Ready(Err(e)) => return Poll::Ready(self.finish(Err(e))),
				Poll::Pending => {
					self.suspend();
					return Poll::Pending;
				}
			}
		}
	}

	/// Attempt a read once, without waiting. `None` means the socket had
	/// nothing ready and the slot is idle again.
	pub fn try_read_inline<S>(&mut self, socket: &S, buf: &mut [u8]) -> Option<Transfer>
	where
		S: SocketIo + ?Sized,
	{
		self.arm(Operation::Read, buf.len());
		loop {
			match socket.try_read(buf) {
				Ok(n) => return Some(self.finish(Ok(n))),
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
					self.pending = None;
					return None;
				}
				Err(e) => return Some(self.finish(Err(e))),
			}
		}
	}

	/// Attempt a write once, without waiting.
	pub fn try_write_inline<S>(&mut self, socket: &S, buf: &[u8]) -> Option<Transfer>
	where
		S: SocketIo + ?Sized,
	{
		self.arm(Operation::Write, buf.len());
		loop {
			match socket.try_write(buf) {
				Ok(n) => return Some(self.finish(Ok(n))),
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
					self.pending = None;
					return None;
				}
				Err(e) => return Some(self.finish(Err(e))),
			}
		}
	}

	fn arm(&mut self, op: Operation, requested: usize) {
		match self.pending.as_mut() {
			Some(pending) => {
				debug_assert_eq!(pending.op, op, "slot reused across directions");
				pending.requested = requested;
			}
			None => {
				self.pending = Some(PendingOp {
					op,
					requested,
					suspended: false,
				})
			}
		}
	}

	fn suspend(&mut self) {
		if let Some(pending) = self.pending.as_mut() {
			pending.suspended = true;
		}
	}

	fn finish(&mut self, result: io::Result<usize>) -> Transfer {
		let pending = self.pending.take();
		self.transfers += 1;
		Transfer {
			op: pending.map_or(Operation::Read, |p| p.op),
			result,
			completed_synchronously: pending.is_some_and(|p| !p.suspended),
		}
	}

	fn reset(&mut self) {
		self.pending = None;
		self.token = None;
	}
}

#[derive(Default)]
struct SlotPoolInner {
	free: SegQueue<OperationSlot>,
	created: AtomicU64,
	leased: AtomicUsize,
}

/// Counters describing a [`SlotPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPoolStats {
	/// Slots ever allocated by the pool.
	pub created: u64,
	/// Slots sitting in the free list.
	pub idle: usize,
	/// Slots currently leased out.
	pub leased: usize,
}

/// Process-wide pool of operation slots.
///
/// Cloning is cheap and shares the free list. Acquire never fails: an empty
/// free list allocates a new slot.
#[derive(Clone, Default)]
pub struct SlotPool {
	inner: Arc<SlotPoolInner>,
}

impl SlotPool {
	pub fn new() -> Self {
		Self::default()
	}

	/// A pool with `count` slots allocated up front.
	pub fn with_capacity(count: usize) -> Self {
		let pool = Self::new();
		for _ in 0..count {
			let slot = pool.allocate();
			pool.inner.free.push(slot);
		}
		pool
	}

	pub fn acquire(&self) -> LeasedSlot {
		let slot = self.inner.free.pop().unwrap_or_else(|| self.allocate());
		self.inner.leased.fetch_add(1, Ordering::Relaxed);
		LeasedSlot {
			slot: Some(slot),
			pool: self.inner.clone(),
		}
	}

	pub fn stats(&self) -> SlotPoolStats {
		SlotPoolStats {
			created: self.inner.created.load(Ordering::Relaxed),
			idle: self.inner.free.len(),
			leased: self.inner.leased.load(Ordering::Relaxed),
		}
	}

	fn allocate(&self) -> OperationSlot {
		let id = self.inner.created.fetch_add(1, Ordering::Relaxed);
		debug!("operation slot pool grew to {} slots", id + 1);
		OperationSlot::new(id)
	}
}

impl std::fmt::Debug for SlotPool {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SlotPool").field("stats", &self.stats()).finish()
	}
}

/// A slot on loan from a [`SlotPool`]. Returned, reset, on drop.
#[derive(Debug)]
pub struct LeasedSlot {
	slot: Option<OperationSlot>,
	pool: Arc<SlotPoolInner>,
}

impl Deref for LeasedSlot {
	type Target = OperationSlot;

	fn deref(&self) -> &OperationSlot {
		match &self.slot {
			Some(slot) => slot,
			None => unreachable!("slot used after release"),
		}
	}
}

impl DerefMut for LeasedSlot {
	fn deref_mut(&mut self) -> &mut OperationSlot {
		match &mut self.slot {
			Some(slot) => slot,
			None => unreachable!("slot used after release"),
		}
	}
}

impl Drop for LeasedSlot {
	fn drop(&mut self) {
		if let Some(mut slot) = self.slot.take() {
			slot.reset();
			self.pool.free.push(slot);
			self.pool.leased.fetch_sub(1, Ordering::Relaxed);
		}
	}
}

impl std::fmt::Debug for SlotPoolInner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SlotPoolInner")
			.field("idle", &self.free.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;
	use std::task::Wake;
	use std::task::Waker;

	use super::*;

	struct Noop;

	impl Wake for Noop {
		fn wake(self: Arc<Self>) {}
	}

	/// Socket whose reads succeed or block according to a script.
	struct Scripted {
		reads: Mutex<Vec<io::Result<Vec<u8>>>>,
	}

	impl Scripted {
		fn new(mut reads: Vec<io::Result<Vec<u8>>>) -> Self {
			reads.reverse();
			Self {
				reads: Mutex::new(reads),
			}
		}
	}

	impl SocketIo for Scripted {
		fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
			match self.reads.lock().unwrap().pop() {
				Some(Ok(data)) => {
					buf[..data.len()].copy_from_slice(&data);
					Ok(data.len())
				}
				Some(Err(e)) => Err(e),
				None => Ok(0),
			}
		}

		fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
			Ok(buf.len())
		}

		fn poll_read_ready(&self, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
			Poll::Pending
		}

		fn poll_write_ready(&self, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
			Poll::Ready(Ok(()))
		}
	}

	#[test]
	fn test_lease_returns_on_drop() {
		let pool = SlotPool::new();
		{
			let _a = pool.acquire();
			let _b = pool.acquire();
			assert_eq!(pool.stats().leased, 2);
		}
		let stats = pool.stats();
		assert_eq!(stats.leased, 0);
		assert_eq!(stats.idle, 2);
		assert_eq!(stats.created, 2);
	}

	#[test]
	fn test_slots_are_reused() {
		let pool = SlotPool::with_capacity(1);
		for _ in 0..10 {
			drop(pool.acquire());
		}
		assert_eq!(pool.stats().created, 1);
	}

	#[test]
	fn test_token_cleared_on_release() {
		let pool = SlotPool::new();
		{
			let mut slot = pool.acquire();
			slot.set_token(17);
			assert_eq!(slot.token(), Some(17));
		}
		let slot = pool.acquire();
		assert_eq!(slot.token(), None);
	}

	#[test]
	fn test_inline_read_is_synchronous() {
		let socket = Scripted::new(vec![Ok(b"+OK\r\n".to_vec())]);
		let pool = SlotPool::new();
		let mut slot = pool.acquire();
		let mut buf = [0u8; 16];
		let transfer = slot.try_read_inline(&socket, &mut buf).unwrap();
		assert!(transfer.completed_synchronously);
		assert_eq!(transfer.result.unwrap(), 5);
		assert!(slot.is_idle());
	}

	#[test]
	fn test_suspended_read_is_asynchronous() {
		let socket = Scripted::new(vec![
			Err(io::ErrorKind::WouldBlock.into()),
			Ok(b":1\r\n".to_vec()),
		]);
		let pool = SlotPool::new();
		let mut slot = pool.acquire();
		let waker = Waker::from(Arc::new(Noop));
		let mut cx = Context::from_waker(&waker);
		let mut buf = [0u8; 16];

		assert!(slot.poll_read(&socket, &mut cx, &mut buf).is_pending());
		assert!(!slot.is_idle());
		assert_eq!(slot.requested(), Some(16));

		let transfer = match slot.poll_read(&socket, &mut cx, &mut buf) {
			Poll::Ready(t) => t,
			Poll::Pending => panic!("expected data"),
		};
		assert!(!transfer.completed_synchronously);
		assert_eq!(transfer.result.unwrap(), 4);
		assert!(slot.is_idle());
		assert_eq!(slot.transfers(), 1);
	}

	#[test]
	fn test_retry_with_smaller_buffer_updates_requested() {
		let socket = Scripted::new(vec![
			Err(io::ErrorKind::WouldBlock.into()),
			Err(io::ErrorKind::WouldBlock.into()),
			Ok(b"ab".to_vec()),
		]);
		let pool = SlotPool::new();
		let mut slot = pool.acquire();
		let waker = Waker::from(Arc::new(Noop));
		let mut cx = Context::from_waker(&waker);

		let mut large = [0u8; 64];
		assert!(slot.poll_read(&socket, &mut cx, &mut large).is_pending());
		assert_eq!(slot.requested(), Some(64));

		let mut small = [0u8; 8];
		assert!(slot.poll_read(&socket, &mut cx, &mut small).is_pending());
		assert_eq!(slot.requested(), Some(8));

		let transfer = match slot.poll_read(&socket, &mut cx, &mut small) {
			Poll::Ready(t) => t,
			Poll::Pending => panic!("expected data"),
		};
		assert_eq!(transfer.result.unwrap(), 2);
		assert!(!transfer.completed_synchronously);
		assert_eq!(slot.requested(), None);
	}

	#[test]
	fn test_would_block_inline_leaves_slot_idle() {
		let socket = Scripted::new(vec![Err(io::ErrorKind::WouldBlock.into())]);
		let pool = SlotPool::new();
		let mut slot = pool.acquire();
		let mut buf = [0u8; 4];
		assert!(slot.try_read_inline(&socket, &mut buf).is_none());
		assert!(slot.is_idle());
	}

	#[test]
	fn test_read_error_is_reported() {
		let socket = Scripted::new(vec![Err(io::ErrorKind::ConnectionReset.into())]);
		let pool = SlotPool::new();
		let mut slot = pool.acquire();
		let waker = Waker::from(Arc::new(Noop));
		let mut cx = Context::from_waker(&waker);
		let mut buf = [0u8; 4];
		let transfer = match slot.poll_read(&socket, &mut cx, &mut buf) {
			Poll::Ready(t) => t,
			Poll::Pending => panic!("expected error"),
		};
		assert_eq!(transfer.op, Operation::Read);
		assert_eq!(
			transfer.result.unwrap_err().kind(),
			io::ErrorKind::ConnectionReset
		);
	}
}
