//! One accepted broadcast peer.
//!
//! A [`Connection`] owns the write side of a client socket plus the
//! metadata the server logs about it. The read side stays with the
//! watcher task spawned by the acceptor, which only uses it to notice the
//! peer going away.
//!
//! Liveness is one-way: once [`Connection::mark_closed`] runs, the
//! connection never becomes live again, and the watcher is woken through
//! [`Connection::closing`] so it can release the socket.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use eventcast_types::ConnectionId;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::ConnectionError;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Why a connection left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its end (EOF) or the read side errored.
    PeerClosed,
    /// A broadcast write failed or timed out.
    Evicted,
    /// The server is shutting down.
    Shutdown,
}

/// One accepted peer, shared between the registry and its watcher task.
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    accepted_at: DateTime<Utc>,
    alive: AtomicBool,
    closing: CancellationToken,

    /// Serializes writes so each peer sees whole lines in send order.
    writer: Mutex<BoxedWriter>,
}

impl Connection {
    /// Wrap the write side of an accepted socket.
    pub fn new<W>(peer: SocketAddr, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id: ConnectionId::new(),
            peer,
            accepted_at: Utc::now(),
            alive: AtomicBool::new(true),
            closing: CancellationToken::new(),
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Unique id assigned at accept time.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address.
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// When the connection was accepted.
    pub const fn accepted_at(&self) -> DateTime<Utc> {
        self.accepted_at
    }

    /// Whether the connection is still eligible for broadcasts.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Clear the liveness flag and wake the watcher.
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    pub fn mark_closed(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::AcqRel);
        self.closing.cancel();
        was_alive
    }

    /// Resolves once [`mark_closed`](Self::mark_closed) has run.
    pub fn closing(&self) -> WaitForCancellationFuture<'_> {
        self.closing.cancelled()
    }

    /// Write one already-framed payload and flush, within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Write`] or [`ConnectionError::Flush`] on
    /// I/O failure and [`ConnectionError::Timeout`] if the deadline passes
    /// first (including time spent waiting for an earlier write).
    pub async fn send(&self, frame: &[u8], timeout: Duration) -> Result<(), ConnectionError> {
        let write = async {
            let mut writer = self.writer.lock().await;
            writer
                .write_all(frame)
                .await
                .map_err(|source| ConnectionError::Write { source })?;
            writer
                .flush()
                .await
                .map_err(|source| ConnectionError::Flush { source })
        };

        tokio::time::timeout(timeout, write)
            .await
            .map_err(|_elapsed| ConnectionError::Timeout { timeout })?
    }

    /// Shut down the write side so the peer reads EOF.
    pub(crate) async fn close(&self) -> std::io::Result<()> {
        self.mark_closed();
        self.writer.lock().await.shutdown().await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("accepted_at", &self.accepted_at)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}
