use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;

use crate::TelemetryError;

const VALID_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Timestamps as "[YYYY-MM-DD HH:MM:SS.micros]" in local time.
struct LocalTime;

impl FormatTime for LocalTime {
	fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
		let now: chrono::DateTime<chrono::Local> = chrono::Local::now();
		write!(w, "{}", now.format("[%Y-%m-%d %H:%M:%S%.6f]"))
	}
}

type ReloadHandle = reload::Handle<EnvFilter, Registry>;

static RELOAD_HANDLE: OnceLock<ReloadHandle> = OnceLock::new();

/// Normalise a bare level name, rejecting anything else.
fn validate_level(level: &str) -> Result<String, TelemetryError> {
	let level_lower = level.trim().to_lowercase();
	if VALID_LEVELS.contains(&level_lower.as_str()) {
		Ok(level_lower)
	} else {
		Err(TelemetryError::InvalidLogLevel(level.to_string()))
	}
}

/// Install the global subscriber at `level`.
///
/// `RUST_LOG`, when set, takes precedence so individual targets such as
/// `transport` or `resp` can be tuned without a rebuild. Records emitted
/// through the `log` crate are forwarded to the same subscriber.
///
/// # Example
///
/// ```no_run
/// telemetry::init("info")?;
/// log::info!("client starting");
/// # Ok::<(), telemetry::TelemetryError>(())
/// ```
pub fn init(level: &str) -> Result<(), TelemetryError> {
	let level = validate_level(level)?;
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

	let (filter_layer, reload_handle) = reload::Layer::new(env_filter);

	tracing_subscriber::registry()
		.with(filter_layer)
		.with(
			fmt::layer()
				.with_timer(LocalTime)
				.with_target(true)
				.with_thread_ids(true)
				.with_line_number(false)
				.with_file(false),
		)
		.try_init()
		.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

	let _ = RELOAD_HANDLE.set(reload_handle);
	tracing::debug!("logger initialized at level {}", level);
	Ok(())
}

/// Swap the active filter for `level`.
///
/// # Errors
///
/// Fails when the level is not one of trace, debug, info, warn, error or
/// off, when [`init`] has not run, or when the subscriber is gone.
pub fn reload_log_level(level: &str) -> Result<(), TelemetryError> {
	let level = validate_level(level)?;
	let handle = RELOAD_HANDLE.get().ok_or(TelemetryError::NotInitialized)?;
	handle
		.reload(EnvFilter::new(&level))
		.map_err(|e| TelemetryError::ReloadFailed(e.to_string()))
}
