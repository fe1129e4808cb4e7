//! Transport error types.

use std::fmt;
use std::io;

use thiserror::Error;

/// Direction of a socket operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	Read,
	Write,
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Operation::Read => f.write_str("read"),
			Operation::Write => f.write_str("write"),
		}
	}
}

/// Errors surfaced by socket operations.
#[derive(Error, Debug)]
pub enum TransportError {
	/// The OS reported a failure. The original error keeps its kind and raw
	/// OS code.
	#[error("socket {op} failed: {source}")]
	Io {
		op: Operation,
		#[source]
		source: io::Error,
	},

	/// The party responsible for completing the operation went away first.
	#[error("operation was abandoned before it completed")]
	Abandoned,

	/// The operation could not finish inline and there is no tokio runtime to
	/// carry it.
	#[error("no tokio runtime available to carry the operation")]
	NoRuntime,
}

impl TransportError {
	pub(crate) fn io(op: Operation, source: io::Error) -> Self {
		TransportError::Io { op, source }
	}

	pub fn kind(&self) -> io::ErrorKind {
		match self {
			TransportError::Io { source, .. } => source.kind(),
			TransportError::Abandoned => io::ErrorKind::Interrupted,
			TransportError::NoRuntime => io::ErrorKind::Unsupported,
		}
	}

	pub fn raw_os_error(&self) -> Option<i32> {
		match self {
			TransportError::Io { source, .. } => source.raw_os_error(),
			_ => None,
		}
	}
}

impl From<TransportError> for io::Error {
	fn from(e: TransportError) -> Self {
		match e {
			TransportError::Io { source, .. } => source,
			other => io::Error::new(other.kind(), other),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_os_error_survives_conversion() {
		let err = TransportError::io(Operation::Read, io::Error::from_raw_os_error(104));
		assert_eq!(err.raw_os_error(), Some(104));
		let io_err: io::Error = err.into();
		assert_eq!(io_err.raw_os_error(), Some(104));
	}

	#[test]
	fn test_abandoned_converts_with_source() {
		let io_err: io::Error = TransportError::Abandoned.into();
		assert_eq!(io_err.kind(), io::ErrorKind::Interrupted);
		let inner = io_err
			.get_ref()
			.and_then(|e| e.downcast_ref::<TransportError>());
		assert!(matches!(inner, Some(TransportError::Abandoned)));
	}

	#[test]
	fn test_display() {
		let err = TransportError::io(
			Operation::Write,
			io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"),
		);
		assert_eq!(err.to_string(), "socket write failed: pipe closed");
	}
}
