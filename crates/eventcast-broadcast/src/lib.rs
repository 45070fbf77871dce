//! TCP broadcast server for eventcast.
//!
//! This crate fans serialized event lines out to every connected TCP
//! client:
//!
//! - [`ConnectionAcceptor`] binds the listener and spawns one watcher task
//!   per accepted connection. The watcher waits for the peer to close and
//!   then removes the connection.
//! - [`BroadcastRegistry`] holds the live connections and writes each line
//!   to all of them. A connection whose write fails or stalls is evicted
//!   without affecting the others.
//! - [`BroadcastSink`] plugs the registry into the producer loop.
//!
//! # Architecture
//!
//! The registry is shared by [`Arc`](std::sync::Arc) between the acceptor
//! and the sink. Membership sits behind a short-lived mutex that is never
//! held across an `.await`; a broadcast snapshots the members and writes
//! to the snapshot, so accepts and evictions never wait on slow sockets.
//!
//! The wire format is one JSON object per line, server to client only.

pub mod acceptor;
pub mod connection;
pub mod error;
pub mod registry;
pub mod sink;

// Re-export primary types for convenience.
pub use acceptor::{ConnectionAcceptor, DrainReport, ListenerHandle};
pub use connection::Connection;
pub use error::{BindError, ConnectionError};
pub use registry::{BroadcastRegistry, BroadcastReport};
pub use sink::BroadcastSink;
