//! Builds nested values from a flat sequence of decoded items.
//!
//! Aggregates are tracked on an explicit frame stack rather than by recursion,
//! so adversarial nesting costs heap, bounded by `max_depth`, instead of
//! stack.

use crate::error::ParseError;
use crate::error::RespError;
use crate::header::AggregateKind;
use crate::types::RespValue;

/// Largest up-front allocation for a fixed aggregate; longer ones grow as
/// elements arrive.
const MAX_PREALLOCATED: usize = 1024;

#[derive(Debug)]
struct Frame {
	kind: AggregateKind,
	/// Declared entry count. `None` for streamed aggregates.
	declared: Option<usize>,
	items: Vec<RespValue>,
}

impl Frame {
	fn is_full(&self) -> bool {
		self.declared.is_some_and(|n| self.items.len() >= n)
	}

	fn finish(self) -> RespValue {
		let Frame {
			kind,
			declared,
			mut items,
		} = self;
		// Some servers answer an empty multi-bulk as `*1\r\n$-1\r\n`.
		if declared == Some(1)
			&& matches!(
				kind,
				AggregateKind::Array | AggregateKind::Set | AggregateKind::Push
			) && matches!(items.as_slice(), [only] if only.is_null())
		{
			items.clear();
		}
		kind.build(items)
	}
}

/// Result of feeding one item.
#[derive(Debug)]
pub(crate) enum Feed {
	/// The root value is complete.
	Done(RespValue),
	/// More items are needed.
	More,
}

#[derive(Debug)]
pub(crate) struct Assembler {
	frames: Vec<Frame>,
	max_depth: usize,
}

impl Assembler {
	pub(crate) fn new(max_depth: usize) -> Self {
		Self {
			frames: Vec::new(),
			max_depth,
		}
	}

	/// Start an aggregate. `len` counts entries; `None` means streamed.
	pub(crate) fn open(&mut self, kind: AggregateKind, len: Option<usize>) -> Result<Feed, ParseError> {
		if len == Some(0) {
			return Ok(self.value(kind.build(Vec::new())));
		}
		if self.frames.len() >= self.max_depth {
			return Err(ParseError::DepthExceeded(self.max_depth));
		}
		self.frames.push(Frame {
			kind,
			declared: len,
			items: Vec::with_capacity(len.unwrap_or(0).min(MAX_PREALLOCATED)),
		});
		Ok(Feed::More)
	}

	/// Add a complete value to the innermost open aggregate.
	pub(crate) fn value(&mut self, mut value: RespValue) -> Feed {
		loop {
			let Some(frame) = self.frames.last_mut() else {
				return Feed::Done(value);
			};
			frame.items.push(value);
			if !frame.is_full() {
				return Feed::More;
			}
			match self.frames.pop() {
				Some(frame) => value = frame.finish(),
				None => return Feed::More,
			}
		}
	}

	/// The `.` terminator.
	pub(crate) fn end(&mut self) -> Result<Feed, ParseError> {
		match self.frames.last() {
			Some(frame) if frame.declared.is_none() => {
				if frame.kind.is_paired() && frame.items.len() % 2 == 1 {
					return Err(ParseError::UnexpectedEndMarker);
				}
				Ok(self.close_streamed())
			}
			_ => Err(ParseError::UnexpectedEndMarker),
		}
	}

	/// The stream ended. Inside a streamed aggregate this acts as its
	/// terminator; anywhere else it is an error.
	pub(crate) fn eof(&mut self) -> Result<Feed, RespError> {
		match self.frames.last() {
			None => Err(RespError::ConnectionClosed),
			Some(frame) if frame.declared.is_none() && !(frame.kind.is_paired() && frame.items.len() % 2 == 1) => {
				Ok(self.close_streamed())
			}
			Some(_) => Err(ParseError::UnexpectedEOF.into()),
		}
	}

	fn close_streamed(&mut self) -> Feed {
		match self.frames.pop() {
			Some(frame) => self.value(frame.finish()),
			None => Feed::More,
		}
	}
}
