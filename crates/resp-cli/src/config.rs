//! Configuration for the client.
//!
//! Values come from an optional TOML, JSON or YAML file (picked by
//! extension) and are then overridden by whatever was passed on the command
//! line.
//!
//! # Example
//!
//! ```no_run
//! use resp_cli::config::{Cli, Parser, load};
//!
//! let args = Cli::parse();
//! let config = load(&args).unwrap();
//! println!("Connecting to {}", config.addr());
//! ```

use std::path::Path;

pub use clap::Parser;
use mempool::BufferPoolConfig;
use resp::ReaderOptions;
use serde::Deserialize;
use thiserror::Error;
use transport::StreamConfig;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("Failed to read configuration file '{path}': {source}")]
	Io {
		source: std::io::Error,
		path: String,
	},

	#[error("Failed to parse TOML configuration: {0}")]
	TomlParse(#[from] toml::de::Error),

	#[error("Failed to parse JSON configuration: {0}")]
	JsonParse(#[from] serde_json::Error),

	#[error("Failed to parse YAML configuration: {0}")]
	YamlParse(#[from] serde_yaml::Error),

	#[error("Unsupported configuration format: {0}")]
	UnsupportedFormat(String),

	#[error("Configuration file has no extension")]
	NoExtension,
}

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
	/// Configuration file path (TOML, JSON, or YAML)
	#[arg(short, long)]
	pub config: Option<String>,

	/// Server host
	#[arg(long)]
	pub host: Option<String>,

	/// Server port
	#[arg(short, long)]
	pub port: Option<u16>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long)]
	pub log_level: Option<String>,

	/// Keep blob payloads as raw bytes instead of decoding UTF-8
	#[arg(long)]
	pub raw: bool,

	/// Command and arguments, e.g. `SET key value`
	#[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
	pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	pub host: String,
	pub port: u16,
	pub log_level: String,
	pub raw: bool,
	pub stream: StreamConfig,
	pub reader: ReaderOptions,
	pub pool: BufferPoolConfig,
}

impl ClientConfig {
	pub fn addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			host: "127.0.0.1".into(),
			port: 6379,
			log_level: "warn".into(),
			raw: false,
			stream: StreamConfig::default(),
			reader: ReaderOptions::default(),
			pool: BufferPoolConfig::default(),
		}
	}
}

/// Resolve the effective configuration for `args`.
pub fn load(args: &Cli) -> Result<ClientConfig, ConfigError> {
	let mut config = match args.config.as_deref() {
		Some(p) => load_from_file(p)?,
		None => ClientConfig::default(),
	};

	if let Some(host) = &args.host {
		config.host = host.clone();
	}
	if let Some(port) = args.port {
		config.port = port;
	}
	if let Some(log_level) = &args.log_level {
		config.log_level = log_level.clone();
	}
	if args.raw {
		config.raw = true;
	}
	Ok(config)
}

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
	let path_ref = path.as_ref();
	let content = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
		path: path_ref.display().to_string(),
		source,
	})?;

	let extension = path_ref
		.extension()
		.and_then(|ext| ext.to_str())
		.ok_or(ConfigError::NoExtension)?;

	match extension.to_lowercase().as_str() {
		"toml" => Ok(toml::from_str(&content)?),
		"json" => Ok(serde_json::from_str(&content)?),
		"yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
		_ => Err(ConfigError::UnsupportedFormat(extension.to_string())),
	}
}
