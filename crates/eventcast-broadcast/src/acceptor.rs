//! TCP listener lifecycle: bind, accept, watch, drain.
//!
//! [`ConnectionAcceptor::start`] binds the listener up front so the caller
//! learns about an unusable address before anything else starts. It then
//! spawns one accept task, which in turn spawns one watcher task per
//! accepted connection.
//!
//! # Shutdown order
//!
//! [`ListenerHandle::shutdown`] drives the following sequence inside the
//! accept task:
//!
//! 1. Stop accepting and drop the listener, freeing the port.
//! 2. Wake every watcher. Each one unregisters its connection and shuts
//!    down the write side so the peer reads EOF.
//! 3. Wait up to the shutdown grace for the watchers to finish, then abort
//!    the rest.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use eventcast_core::config::BroadcastConfig;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{CloseReason, Connection};
use crate::error::BindError;
use crate::registry::BroadcastRegistry;

/// Default time connections get to close on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Pause after a failed `accept` before retrying.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Size of the scratch buffer used to discard inbound bytes.
const DISCARD_BUFFER_SIZE: usize = 512;

/// How the drain at shutdown went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Connections that closed within the grace period.
    pub closed: usize,
    /// Connections aborted after the grace period expired.
    pub forced: usize,
}

/// Binds the broadcast listener and feeds accepted connections to a
/// [`BroadcastRegistry`].
#[derive(Debug, Clone)]
pub struct ConnectionAcceptor {
    registry: Arc<BroadcastRegistry>,
    shutdown_grace: Duration,
}

impl ConnectionAcceptor {
    /// An acceptor registering into `registry`.
    pub const fn new(registry: Arc<BroadcastRegistry>) -> Self {
        Self {
            registry,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Build the registry and acceptor described by `config`.
    pub fn from_config(config: &BroadcastConfig) -> Self {
        let registry = Arc::new(BroadcastRegistry::new(config.write_timeout()));
        Self::new(registry).with_shutdown_grace(config.shutdown_grace())
    }

    /// Override the shutdown grace period.
    #[must_use]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// The registry accepted connections are added to.
    pub const fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    /// Bind `address` (`host:port`) and start accepting in the background.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::InvalidAddress`] if `address` does not resolve
    /// and [`BindError::Bind`] if the OS refuses the bind.
    pub async fn start(self, address: &str) -> Result<ListenerHandle, BindError> {
        let addr = resolve(address).await?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BindError::Bind {
                address: address.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| BindError::Bind {
            address: address.to_owned(),
            source,
        })?;

        info!(%local_addr, "TCP server listening");

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.registry),
            shutdown.clone(),
            self.shutdown_grace,
        ));

        Ok(ListenerHandle {
            local_addr,
            registry: self.registry,
            shutdown,
            task,
        })
    }
}

async fn resolve(address: &str) -> Result<SocketAddr, BindError> {
    let invalid = |source| BindError::InvalidAddress {
        address: address.to_owned(),
        source,
    };
    tokio::net::lookup_host(address)
        .await
        .map_err(invalid)?
        .next()
        .ok_or_else(|| {
            invalid(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address resolved to nothing",
            ))
        })
}

/// A running listener. Dropping the handle leaves the accept task running;
/// call [`shutdown`](Self::shutdown) to stop it.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    registry: Arc<BroadcastRegistry>,
    shutdown: CancellationToken,
    task: JoinHandle<DrainReport>,
}

impl ListenerHandle {
    /// The bound address (useful when binding port 0).
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The registry fed by this listener.
    pub const fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    /// Number of currently registered connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Close the listener and drain every connection.
    ///
    /// Returns once the port is released and every connection has closed
    /// or been aborted.
    pub async fn shutdown(self) -> DrainReport {
        info!(local_addr = %self.local_addr, "Shutting down TCP server");
        self.shutdown.cancel();
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Accept task failed during shutdown");
                DrainReport {
                    closed: 0,
                    forced: self.registry.drain().len(),
                }
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<BroadcastRegistry>,
    shutdown: CancellationToken,
    grace: Duration,
) -> DrainReport {
    let connections = CancellationToken::new();
    let mut watchers = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            Some(joined) = watchers.join_next(), if !watchers.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "Connection watcher failed");
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let (conn, reader) = register(stream, peer, &registry);
                    let registry = Arc::clone(&registry);
                    watchers.spawn(watch(conn, reader, registry, connections.clone()));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }

    // --- Stop accepting ---
    drop(listener);
    info!(live = registry.len(), "Listener closed, draining connections");

    // --- Wake watchers and wait ---
    connections.cancel();
    let mut closed: usize = 0;
    let finished = tokio::time::timeout(grace, async {
        while let Some(joined) = watchers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Connection watcher failed");
            }
            closed = closed.saturating_add(1);
        }
    })
    .await
    .is_ok();

    // --- Abort stragglers ---
    let mut forced = 0;
    if !finished {
        forced = watchers.len();
        warn!(
            forced,
            grace_ms = grace.as_millis(),
            "Aborting connections after grace period"
        );
        watchers.abort_all();
        while watchers.join_next().await.is_some() {}
    }
    let leftover = registry.drain().len();
    if leftover > 0 {
        debug!(leftover, "Dropped connections left in registry");
    }

    let report = DrainReport { closed, forced };
    info!(closed = report.closed, forced = report.forced, "TCP server stopped");
    report
}

fn register(
    stream: TcpStream,
    peer: SocketAddr,
    registry: &BroadcastRegistry,
) -> (Arc<Connection>, OwnedReadHalf) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
    }
    let (reader, writer) = stream.into_split();
    let conn = Arc::new(Connection::new(peer, writer));
    registry.register(Arc::clone(&conn));
    info!(
        connection = %conn.id(),
        %peer,
        live = registry.len(),
        "Client connected"
    );
    (conn, reader)
}

/// Wait for the peer to go away (or to be told to stop), then release the
/// connection. Inbound bytes are read and discarded.
async fn watch(
    conn: Arc<Connection>,
    mut reader: OwnedReadHalf,
    registry: Arc<BroadcastRegistry>,
    shutdown: CancellationToken,
) {
    let mut discard = [0u8; DISCARD_BUFFER_SIZE];

    let reason = loop {
        tokio::select! {
            () = shutdown.cancelled() => break CloseReason::Shutdown,
            () = conn.closing() => break CloseReason::Evicted,
            read = reader.read(&mut discard) => match read {
                Ok(0) => break CloseReason::PeerClosed,
                Ok(_) => {}
                Err(e) => {
                    debug!(
                        connection = %conn.id(),
                        error = %e,
                        "Read error, treating as peer close"
                    );
                    break CloseReason::PeerClosed;
                }
            },
        }
    };

    registry.unregister(conn.id());
    if let Err(e) = conn.close().await {
        debug!(connection = %conn.id(), error = %e, "Error closing connection");
    }

    if reason == CloseReason::PeerClosed {
        debug!(connection = %conn.id(), peer = %conn.peer(), "Peer closed connection");
    }
    info!(
        connection = %conn.id(),
        peer = %conn.peer(),
        reason = ?reason,
        live = registry.len(),
        "Client disconnected"
    );
}
