//! Configuration loading and typed config structures for the generator.
//!
//! Configuration is layered. Built-in defaults are overridden by an
//! optional YAML file, which is overridden by environment variables,
//! which the binary in turn overrides with command-line flags:
//!
//! ```text
//! defaults < YAML file < EVENTCAST_* env vars < CLI flags
//! ```
//!
//! Every field carries a `#[serde(default = ...)]`, so a YAML file only
//! needs the keys it changes and an empty document is valid.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::rate::{DEFAULT_PERIOD_SECONDS, DEFAULT_RATE, RateError, TickRate};

/// Environment variable overriding `broadcast.host`.
pub const ENV_HOST: &str = "EVENTCAST_HOST";

/// Environment variable overriding `broadcast.port`.
pub const ENV_PORT: &str = "EVENTCAST_PORT";

/// Environment variable overriding `producer.rate`.
pub const ENV_RATE: &str = "EVENTCAST_RATE";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An override carried a value that does not parse as its field type.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidOverride {
        /// The environment variable or key that was read.
        key: String,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level generator configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeneratorConfig {
    /// Producer loop settings.
    #[serde(default)]
    pub producer: ProducerConfig,

    /// TCP broadcast settings.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GeneratorConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `EVENTCAST_HOST` overrides `broadcast.host`
    /// - `EVENTCAST_PORT` overrides `broadcast.port`
    /// - `EVENTCAST_RATE` overrides `producer.rate`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] if an environment override does
    /// not parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply `EVENTCAST_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if a set variable does not
    /// parse.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if a present value does not
    /// parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.broadcast.host = host;
        }
        if let Some(raw) = lookup(ENV_PORT) {
            self.broadcast.port = parse_override(ENV_PORT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RATE) {
            self.producer.rate = parse_override(ENV_RATE, &raw)?;
        }
        Ok(())
    }
}

fn parse_override<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidOverride {
            key: key.to_owned(),
            value: raw.to_owned(),
            reason: e.to_string(),
        })
}

/// Producer loop configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProducerConfig {
    /// Events per second.
    #[serde(default = "default_rate")]
    pub rate: f64,

    /// Scaling period in seconds; the tick interval is `period_seconds / rate`.
    #[serde(default = "default_period_seconds")]
    pub period_seconds: f64,

    /// Echo every event to stdout.
    #[serde(default = "default_console")]
    pub console: bool,

    /// Stop after this many events (0 = run until interrupted).
    #[serde(default)]
    pub max_events: u64,
}

impl ProducerConfig {
    /// Derive the tick pacing from `rate` and `period_seconds`.
    ///
    /// # Errors
    ///
    /// Returns [`RateError`] if the period is invalid or the interval
    /// overflows.
    pub fn tick_rate(&self) -> Result<TickRate, RateError> {
        TickRate::new(self.rate, self.period_seconds)
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            period_seconds: default_period_seconds(),
            console: default_console(),
            max_events: 0,
        }
    }
}

/// TCP broadcast configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BroadcastConfig {
    /// Whether to start the TCP listener at all.
    #[serde(default)]
    pub enabled: bool,

    /// Listen host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port. `0` picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Milliseconds one connection may take to accept a line before it is
    /// evicted.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Milliseconds to wait for connections to close on shutdown before
    /// aborting them.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl BroadcastConfig {
    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-connection write deadline.
    pub const fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Shutdown grace period.
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
            write_timeout_ms: default_write_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_rate() -> f64 {
    DEFAULT_RATE
}

const fn default_period_seconds() -> f64 {
    DEFAULT_PERIOD_SECONDS
}

const fn default_console() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_port() -> u16 {
    9999
}

const fn default_write_timeout_ms() -> u64 {
    1000
}

const fn default_shutdown_grace_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_owned()
}
