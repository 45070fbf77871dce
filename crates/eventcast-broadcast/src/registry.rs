//! The live-connection set and line fan-out.
//!
//! [`BroadcastRegistry::broadcast`] works in two phases:
//!
//! 1. Snapshot the members under the lock, release it, and write the
//!    line to every snapshot member concurrently. Each write has its own
//!    deadline, so one stalled peer costs at most `write_timeout`.
//! 2. Unregister every connection whose write failed, once each.
//!
//! Connections registered after the snapshot miss the in-flight line;
//! connections removed after the snapshot are written to one last time and
//! any failure is absorbed. Neither case is an error.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use eventcast_types::ConnectionId;
use futures::future::join_all;
use tracing::warn;

use crate::connection::Connection;

/// Default per-connection write deadline.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome counts for one [`BroadcastRegistry::broadcast`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections in the snapshot.
    pub attempted: usize,
    /// Connections that accepted the line.
    pub delivered: usize,
    /// Connections removed because their write failed or timed out.
    pub evicted: usize,
}

/// Shared set of live connections.
#[derive(Debug)]
pub struct BroadcastRegistry {
    connections: Mutex<BTreeMap<ConnectionId, Arc<Connection>>>,
    write_timeout: Duration,
}

impl BroadcastRegistry {
    /// Create an empty registry with the given per-connection write deadline.
    pub const fn new(write_timeout: Duration) -> Self {
        Self {
            connections: Mutex::new(BTreeMap::new()),
            write_timeout,
        }
    }

    /// Per-connection write deadline.
    pub const fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    fn members(&self) -> MutexGuard<'_, BTreeMap<ConnectionId, Arc<Connection>>> {
        // Membership edits are single map operations; a panic elsewhere
        // cannot leave the map half-updated.
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection to the live set.
    pub fn register(&self, connection: Arc<Connection>) {
        self.members().insert(connection.id(), connection);
    }

    /// Remove a connection and mark it closed.
    ///
    /// Returns the connection if it was present. Removing an unknown or
    /// already-removed id is a no-op.
    pub fn unregister(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let removed = self.members().remove(&id);
        if let Some(conn) = &removed {
            conn.mark_closed();
        }
        removed
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members().contains_key(&id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.members().len()
    }

    /// Whether there are no live connections.
    pub fn is_empty(&self) -> bool {
        self.members().is_empty()
    }

    /// Clone out the current members.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.members().values().cloned().collect()
    }

    /// Remove every connection, marking each closed.
    pub(crate) fn drain(&self) -> Vec<Arc<Connection>> {
        let drained = std::mem::take(&mut *self.members());
        drained
            .into_values()
            .inspect(|conn| {
                conn.mark_closed();
            })
            .collect()
    }

    /// Write `line` followed by `\n` to every live connection.
    ///
    /// Never fails: per-connection errors are logged and the failing
    /// connections evicted.
    pub async fn broadcast(&self, line: &str) -> BroadcastReport {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return BroadcastReport::default();
        }

        let frame = format!("{line}\n");
        let timeout = self.write_timeout;

        // --- Phase 1: write to the snapshot ---
        let outcomes = join_all(snapshot.iter().map(|conn| {
            let frame = frame.as_bytes();
            async move { (conn, conn.send(frame, timeout).await) }
        }))
        .await;

        // --- Phase 2: evict failures ---
        let mut report = BroadcastReport {
            attempted: snapshot.len(),
            ..BroadcastReport::default()
        };
        for (conn, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(e) => {
                    warn!(
                        connection = %conn.id(),
                        peer = %conn.peer(),
                        error = %e,
                        "Evicting connection after write failure"
                    );
                    if self.unregister(conn.id()).is_some() {
                        report.evicted = report.evicted.saturating_add(1);
                    }
                }
            }
        }

        report
    }
}

impl Default for BroadcastRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_TIMEOUT)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;

    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};

    use super::*;

    fn connection() -> (Arc<Connection>, DuplexStream) {
        let (client, server) = tokio::io::duplex(1024);
        let peer = SocketAddr::from(([127, 0, 0, 1], 50_000));
        (Arc::new(Connection::new(peer, client)), server)
    }

    async fn read_line(stream: &mut BufReader<DuplexStream>) -> String {
        let mut line = String::new();
        stream.read_line(&mut line).await.unwrap();
        line
    }

    #[test]
    fn register_then_unregister_leaves_empty() {
        let registry = BroadcastRegistry::default();
        let (conn, _peer) = connection();
        let id = conn.id();

        registry.register(conn);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(id));

        assert!(registry.unregister(id).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = BroadcastRegistry::default();
        let (conn, _peer) = connection();
        let id = conn.id();
        registry.register(Arc::clone(&conn));

        assert!(registry.unregister(id).is_some());
        assert!(registry.unregister(id).is_none());
        assert!(registry.unregister(ConnectionId::new()).is_none());
        assert!(!conn.is_alive());
    }

    #[tokio::test]
    async fn broadcast_with_no_connections_is_empty_report() {
        let registry = BroadcastRegistry::default();
        let report = registry.broadcast("{}").await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn every_connection_gets_the_line_with_newline() {
        let registry = BroadcastRegistry::default();
        let (a, a_peer) = connection();
        let (b, b_peer) = connection();
        registry.register(a);
        registry.register(b);

        let report = registry.broadcast(r#"{"n":1}"#).await;
        assert_eq!(
            report,
            BroadcastReport {
                attempted: 2,
                delivered: 2,
                evicted: 0
            }
        );

        let mut a_peer = BufReader::new(a_peer);
        let mut b_peer = BufReader::new(b_peer);
        assert_eq!(read_line(&mut a_peer).await, "{\"n\":1}\n");
        assert_eq!(read_line(&mut b_peer).await, "{\"n\":1}\n");
    }

    #[tokio::test]
    async fn one_failing_connection_is_evicted_exactly_once() {
        let registry = BroadcastRegistry::default();
        let mut healthy = Vec::new();
        for _ in 0..4 {
            let (conn, peer) = connection();
            registry.register(conn);
            healthy.push(BufReader::new(peer));
        }
        let (broken, broken_peer) = connection();
        let broken_id = broken.id();
        registry.register(Arc::clone(&broken));
        drop(broken_peer);

        let report = registry.broadcast("line").await;
        assert_eq!(report.attempted, 5);
        assert_eq!(report.delivered, 4);
        assert_eq!(report.evicted, 1);
        assert_eq!(registry.len(), 4);
        assert!(!registry.contains(broken_id));
        assert!(!broken.is_alive());

        for peer in &mut healthy {
            assert_eq!(read_line(peer).await, "line\n");
        }

        let second = registry.broadcast("again").await;
        assert_eq!(second.attempted, 4);
        assert_eq!(second.evicted, 0);
    }

    #[tokio::test]
    async fn lines_arrive_in_broadcast_order() {
        let registry = BroadcastRegistry::default();
        let (conn, peer) = connection();
        registry.register(conn);

        for n in 0..5 {
            registry.broadcast(&format!("line-{n}")).await;
        }

        let mut peer = BufReader::new(peer);
        for n in 0..5 {
            assert_eq!(read_line(&mut peer).await, format!("line-{n}\n"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_connection_is_evicted_after_timeout() {
        let registry = BroadcastRegistry::new(Duration::from_millis(100));
        let (client, _stalled_peer) = tokio::io::duplex(4);
        let peer = SocketAddr::from(([127, 0, 0, 1], 50_001));
        registry.register(Arc::new(Connection::new(peer, client)));

        let report = registry.broadcast("much longer than four bytes").await;
        assert_eq!(report.evicted, 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn drain_empties_and_closes() {
        let registry = BroadcastRegistry::default();
        let (a, _a_peer) = connection();
        let (b, _b_peer) = connection();
        registry.register(Arc::clone(&a));
        registry.register(b);

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
        assert!(!a.is_alive());
    }
}
