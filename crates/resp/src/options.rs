use serde::Deserialize;

/// Limits and scratch sizes for the RESP3 readers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
	/// Aggregates may nest this many levels deep.
	pub max_depth: usize,
	/// Largest blob payload accepted, fixed or streamed.
	pub max_blob_len: usize,
	/// Largest line (simple string, number, length token) accepted.
	pub max_line_len: usize,
	/// Scratch buffer size used when copying blob payloads.
	pub chunk_size: usize,
}

impl Default for ReaderOptions {
	fn default() -> Self {
		Self {
			max_depth: 64,
			max_blob_len: 512 * 1024 * 1024,
			max_line_len: 64 * 1024,
			chunk_size: 1024,
		}
	}
}
