//! Error types for the broadcast server.
//!
//! Only [`BindError`] ever reaches a caller. [`ConnectionError`] describes
//! why one connection was evicted; it is logged and counted, never
//! returned from a broadcast.

use std::time::Duration;

/// The listening address could not be bound.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// The configured address does not resolve to a socket address.
    #[error("invalid listen address {address}: {source}")]
    InvalidAddress {
        /// The address as configured.
        address: String,
        /// The underlying resolution error.
        #[source]
        source: std::io::Error,
    },

    /// The OS refused the bind (address in use, permission denied, ...).
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// The address as configured.
        address: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Why a write to one connection failed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Writing the line failed.
    #[error("write failed: {source}")]
    Write {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Flushing after the write failed.
    #[error("flush failed: {source}")]
    Flush {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The write and flush did not finish within the deadline.
    #[error("write timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },
}
