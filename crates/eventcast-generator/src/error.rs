//! Error types for the generator lifecycle.
//!
//! [`GeneratorError`] wraps every failure that can stop a run, so `main`
//! can propagate with `?`.

use eventcast_broadcast::BindError;
use eventcast_core::config::ConfigError;
use eventcast_core::producer::ProducerError;
use eventcast_core::rate::RateError;

/// Top-level error for a generator run.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The configured rate or period is unusable.
    #[error("rate error: {source}")]
    Rate {
        /// The underlying rate error.
        #[from]
        source: RateError,
    },

    /// The broadcast listener could not bind.
    #[error("bind error: {source}")]
    Bind {
        /// The underlying bind error.
        #[from]
        source: BindError,
    },

    /// The producer loop refused to run.
    #[error("producer error: {source}")]
    Producer {
        /// The underlying producer error.
        #[from]
        source: ProducerError,
    },

    /// The producer task panicked or was cancelled.
    #[error("producer task failed: {source}")]
    ProducerTask {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
