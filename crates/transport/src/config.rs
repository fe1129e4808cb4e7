use serde::Deserialize;

/// Read-side behaviour of a [`BufferedStream`](crate::BufferedStream).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
	/// Bytes requested from the socket per refill.
	pub read_ahead_capacity: usize,
	/// Start with read-ahead enabled. Can be flipped at runtime.
	pub buffered: bool,
}

impl Default for StreamConfig {
	fn default() -> Self {
		Self {
			read_ahead_capacity: 4096,
			buffered: true,
		}
	}
}
