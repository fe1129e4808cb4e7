use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use bytes::BytesMut;
use crossbeam_queue::SegQueue;
use log::debug;
use serde::Deserialize;

use crate::guard::PooledAccumulator;
use crate::guard::PooledBuffer;
use crate::guard::PooledText;

/// Sizing and retention limits for a [`BufferPool`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BufferPoolConfig {
	/// Smallest buffer size class. Rounded up to a power of two.
	pub min_buffer_size: usize,
	/// Largest pooled buffer size class. Larger requests are allocated once
	/// and dropped on return.
	pub max_buffer_size: usize,
	/// Idle buffers kept per size class (and idle accumulators / texts kept).
	pub max_retained_per_class: usize,
	/// Accumulators that grew past this capacity are dropped on return.
	pub max_retained_accumulator_capacity: usize,
	/// Text builders that grew past this capacity are dropped on return.
	pub max_retained_text_capacity: usize,
}

impl Default for BufferPoolConfig {
	fn default() -> Self {
		Self {
			min_buffer_size: 256,
			max_buffer_size: 1024 * 1024,
			max_retained_per_class: 256,
			max_retained_accumulator_capacity: 1024 * 1024,
			max_retained_text_capacity: 64 * 1024,
		}
	}
}

/// Snapshot of pool counters.
///
/// `*_outstanding` counts items currently checked out; `*_allocated` counts
/// fresh allocations made because the free list was empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
	pub buffers_outstanding: usize,
	pub accumulators_outstanding: usize,
	pub texts_outstanding: usize,
	pub buffers_allocated: usize,
	pub accumulators_allocated: usize,
	pub texts_allocated: usize,
}

impl PoolStats {
	/// Total items currently checked out, across all kinds.
	pub fn outstanding(&self) -> usize {
		self.buffers_outstanding + self.accumulators_outstanding + self.texts_outstanding
	}
}

struct SizeClass {
	size: usize,
	free: SegQueue<Box<[u8]>>,
}

#[derive(Default)]
struct Counters {
	buffers_outstanding: AtomicUsize,
	accumulators_outstanding: AtomicUsize,
	texts_outstanding: AtomicUsize,
	buffers_allocated: AtomicUsize,
	accumulators_allocated: AtomicUsize,
	texts_allocated: AtomicUsize,
}

pub(crate) struct PoolInner {
	config: BufferPoolConfig,
	classes: Vec<SizeClass>,
	accumulators: SegQueue<BytesMut>,
	texts: SegQueue<String>,
	counters: Counters,
}

/// Shared pool of reusable buffers.
///
/// Cloning is cheap and every clone refers to the same free lists. The free
/// lists are lock-free queues, so connections on different threads never
/// block each other. The pool grows on demand and never rejects a caller.
#[derive(Clone)]
pub struct BufferPool {
	inner: Arc<PoolInner>,
}

impl Default for BufferPool {
	fn default() -> Self {
		Self::new(BufferPoolConfig::default())
	}
}

impl std::fmt::Debug for BufferPool {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BufferPool")
			.field("config", &self.inner.config)
			.field("stats", &self.stats())
			.finish()
	}
}

impl BufferPool {
	pub fn new(mut config: BufferPoolConfig) -> Self {
		config.min_buffer_size = config.min_buffer_size.max(1).next_power_of_two();
		config.max_buffer_size = config
			.max_buffer_size
			.max(config.min_buffer_size)
			.next_power_of_two();

		let mut classes = Vec::new();
		let mut size = config.min_buffer_size;
		while size <= config.max_buffer_size {
			classes.push(SizeClass {
				size,
				free: SegQueue::new(),
			});
			size <<= 1;
		}

		Self {
			inner: Arc::new(PoolInner {
				config,
				classes,
				accumulators: SegQueue::new(),
				texts: SegQueue::new(),
				counters: Counters::default(),
			}),
		}
	}

	pub fn config(&self) -> &BufferPoolConfig {
		&self.inner.config
	}

	/// Check out a byte buffer of at least `min_len` bytes.
	///
	/// The buffer may be longer than requested; its contents are whatever the
	/// previous user left behind.
	pub fn checkout_buffer(&self, min_len: usize) -> PooledBuffer {
		let inner = &self.inner;
		inner
			.counters
			.buffers_outstanding
			.fetch_add(1, Ordering::Relaxed);

		match inner.class_index(min_len) {
			Some(index) => {
				let class = &inner.classes[index];
				let buf = class.free.pop().unwrap_or_else(|| {
					inner.counters.buffers_allocated.fetch_add(1, Ordering::Relaxed);
					vec![0u8; class.size].into_boxed_slice()
				});
				PooledBuffer::new(buf, Some(index), self.inner.clone())
			}
			None => {
				debug!(
					"buffer request of {} bytes exceeds largest class, allocating unpooled",
					min_len
				);
				inner.counters.buffers_allocated.fetch_add(1, Ordering::Relaxed);
				PooledBuffer::new(vec![0u8; min_len].into_boxed_slice(), None, self.inner.clone())
			}
		}
	}

	/// Check out an empty growable byte accumulator.
	pub fn checkout_accumulator(&self) -> PooledAccumulator {
		let inner = &self.inner;
		inner
			.counters
			.accumulators_outstanding
			.fetch_add(1, Ordering::Relaxed);
		let buf = inner.accumulators.pop().unwrap_or_else(|| {
			inner
				.counters
				.accumulators_allocated
				.fetch_add(1, Ordering::Relaxed);
			BytesMut::with_capacity(inner.config.min_buffer_size)
		});
		PooledAccumulator::new(buf, self.inner.clone())
	}

	/// Check out an empty text builder.
	pub fn checkout_text(&self) -> PooledText {
		let inner = &self.inner;
		inner
			.counters
			.texts_outstanding
			.fetch_add(1, Ordering::Relaxed);
		let text = inner.texts.pop().unwrap_or_else(|| {
			inner.counters.texts_allocated.fetch_add(1, Ordering::Relaxed);
			String::with_capacity(64)
		});
		PooledText::new(text, self.inner.clone())
	}

	pub fn stats(&self) -> PoolStats {
		let c = &self.inner.counters;
		PoolStats {
			buffers_outstanding: c.buffers_outstanding.load(Ordering::Relaxed),
			accumulators_outstanding: c.accumulators_outstanding.load(Ordering::Relaxed),
			texts_outstanding: c.texts_outstanding.load(Ordering::Relaxed),
			buffers_allocated: c.buffers_allocated.load(Ordering::Relaxed),
			accumulators_allocated: c.accumulators_allocated.load(Ordering::Relaxed),
			texts_allocated: c.texts_allocated.load(Ordering::Relaxed),
		}
	}
}

impl PoolInner {
	fn class_index(&self, len: usize) -> Option<usize> {
		if len > self.config.max_buffer_size {
			return None;
		}
		let size = len.max(self.config.min_buffer_size).next_power_of_two();
		Some((size / self.config.min_buffer_size).trailing_zeros() as usize)
	}

	pub(crate) fn return_buffer(&self, buf: Box<[u8]>, class: Option<usize>) {
		self.counters
			.buffers_outstanding
			.fetch_sub(1, Ordering::Relaxed);
		if let Some(index) = class {
			let class = &self.classes[index];
			if class.free.len() < self.config.max_retained_per_class {
				class.free.push(buf);
			}
		}
	}

	pub(crate) fn return_accumulator(&self, mut buf: BytesMut) {
		self.counters
			.accumulators_outstanding
			.fetch_sub(1, Ordering::Relaxed);
		if buf.capacity() > self.config.max_retained_accumulator_capacity
			|| self.accumulators.len() >= self.config.max_retained_per_class
		{
			return;
		}
		buf.clear();
		self.accumulators.push(buf);
	}

	pub(crate) fn return_text(&self, mut text: String) {
		self.counters
			.texts_outstanding
			.fetch_sub(1, Ordering::Relaxed);
		if text.capacity() > self.config.max_retained_text_capacity
			|| self.texts.len() >= self.config.max_retained_per_class
		{
			return;
		}
		text.clear();
		self.texts.push(text);
	}
}
