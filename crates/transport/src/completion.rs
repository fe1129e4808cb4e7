//! Single-use completion handle for one socket operation.
//!
//! A [`Completer`] / [`Completion`] pair is created with
//! [`Completion::pending`] and carries its result over a tokio oneshot
//! channel. The completer side settles it exactly once, either with a value
//! or with an error. The completion side observes the result in whichever way
//! suits the caller:
//!
//! - [`Completion::wait`] parks the current thread,
//! - `.await` suspends the current task,
//! - [`Completion::on_complete`] runs a callback on a worker thread.
//!
//! An operation that finished before its caller could observe it is created
//! with [`Completion::ready`] and reports
//! [`CompletionState::CompletedSync`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;

use log::warn;
use tokio::sync::oneshot;

use crate::error::TransportError;

/// Where a completion is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
	Pending,
	/// Finished before it was handed to the caller.
	CompletedSync,
	/// Finished later, on whatever carried the operation.
	CompletedAsync,
}

const PENDING: u8 = 0;
const COMPLETED_SYNC: u8 = 1;
const COMPLETED_ASYNC: u8 = 2;

impl CompletionState {
	fn from_u8(phase: u8) -> Self {
		match phase {
			COMPLETED_SYNC => CompletionState::CompletedSync,
			COMPLETED_ASYNC => CompletionState::CompletedAsync,
			_ => CompletionState::Pending,
		}
	}
}

type Outcome<T> = Result<T, TransportError>;

/// A receive error means the sender went away unsettled.
fn outcome<T>(received: Result<Outcome<T>, oneshot::error::RecvError>) -> Outcome<T> {
	received.unwrap_or(Err(TransportError::Abandoned))
}

/// Observing side of a single socket operation.
///
/// Implements [`Future`]; awaiting it yields the operation's result.
pub struct Completion<T> {
	rx: oneshot::Receiver<Outcome<T>>,
	phase: Arc<AtomicU8>,
}

/// Settling side of a single socket operation.
///
/// Dropping a completer without settling it fails the completion with
/// [`TransportError::Abandoned`], so waiters never hang.
pub struct Completer<T> {
	tx: Option<oneshot::Sender<Outcome<T>>>,
	phase: Arc<AtomicU8>,
}

impl<T: Send + 'static> Completion<T> {
	/// Create an unsettled pair.
	pub fn pending() -> (Completer<T>, Completion<T>) {
		let (tx, rx) = oneshot::channel();
		let phase = Arc::new(AtomicU8::new(PENDING));
		(
			Completer {
				tx: Some(tx),
				phase: phase.clone(),
			},
			Completion { rx, phase },
		)
	}

	/// A completion that finished inline.
	pub fn ready(result: Outcome<T>) -> Self {
		Self::settled(result, COMPLETED_SYNC)
	}

	fn settled(result: Outcome<T>, phase: u8) -> Self {
		let (tx, rx) = oneshot::channel();
		// The receiver is alive, so the send cannot fail.
		let _ = tx.send(result);
		Completion {
			rx,
			phase: Arc::new(AtomicU8::new(phase)),
		}
	}

	pub fn state(&self) -> CompletionState {
		CompletionState::from_u8(self.phase.load(Ordering::Acquire))
	}

	pub fn is_completed(&self) -> bool {
		self.state() != CompletionState::Pending
	}

	pub fn completed_synchronously(&self) -> bool {
		self.state() == CompletionState::CompletedSync
	}

	/// Block the current thread until the operation settles.
	///
	/// Panics when called from an async task, like
	/// [`oneshot::Receiver::blocking_recv`]; use `.await` there, or run the
	/// blocking caller under `spawn_blocking`.
	pub fn wait(self) -> Result<T, TransportError> {
		outcome(self.rx.blocking_recv())
	}

	/// Run `callback` once the operation settles.
	///
	/// The callback gets the settled completion and never runs on the thread
	/// that settled it. Inside a runtime a task drains the channel and hands
	/// the result to the blocking pool; without one a dedicated thread waits
	/// for it. A completion that has already settled is dispatched the same
	/// way.
	pub fn on_complete<F>(self, callback: F)
	where
		F: FnOnce(Completion<T>) + Send + 'static,
	{
		let Completion { rx, phase } = self;
		let deliver = move |result: Outcome<T>| {
			let phase = phase.load(Ordering::Acquire);
			callback(Completion::settled(result, phase));
		};
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				drop(handle.spawn(async move {
					let result = outcome(rx.await);
					drop(tokio::task::spawn_blocking(move || deliver(result)));
				}));
			}
			Err(_) => {
				let spawned = std::thread::Builder::new()
					.name("completion-callback".to_string())
					.spawn(move || deliver(outcome(rx.blocking_recv())));
				if let Err(e) = spawned {
					warn!("failed to start completion callback thread: {}", e);
				}
			}
		}
	}
}

impl<T> Future for Completion<T> {
	type Output = Result<T, TransportError>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx).poll(cx).map(outcome)
	}
}

impl<T> std::fmt::Debug for Completion<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Completion")
			.field(
				"state",
				&CompletionState::from_u8(self.phase.load(Ordering::Acquire)),
			)
			.finish()
	}
}

impl<T> Completer<T> {
	pub fn complete(self, value: T) {
		self.settle(Ok(value));
	}

	pub fn fail(self, error: TransportError) {
		self.settle(Err(error));
	}

	pub fn settle(mut self, result: Result<T, TransportError>) {
		if let Some(tx) = self.tx.take() {
			self.phase.store(COMPLETED_ASYNC, Ordering::Release);
			// A dropped receiver means nobody is interested in the result.
			let _ = tx.send(result);
		}
	}
}

impl<T> Drop for Completer<T> {
	fn drop(&mut self) {
		// Dropping the sender wakes the receiver with a `RecvError`, which
		// surfaces as `Abandoned`.
		if let Some(tx) = self.tx.take() {
			self.phase.store(COMPLETED_ASYNC, Ordering::Release);
			drop(tx);
		}
	}
}
