//! Logging setup shared by the binaries.
//!
//! Libraries in this workspace log through the `log` facade. [`init`]
//! installs a `tracing` subscriber and bridges `log` records into it, so one
//! filter governs both.

pub mod logger;

use thiserror::Error;

pub use logger::init;
pub use logger::reload_log_level;

#[derive(Debug, Error)]
pub enum TelemetryError {
	#[error("Invalid log level: {0}")]
	InvalidLogLevel(String),

	#[error("Logger not initialized")]
	NotInitialized,

	#[error("Logger already initialized: {0}")]
	AlreadyInitialized(String),

	#[error("Failed to reload log level: {0}")]
	ReloadFailed(String),
}
