//! Shared producer control state.
//!
//! [`ProducerControl`] is wrapped in [`Arc`](std::sync::Arc) and shared
//! between the producer loop and whoever owns its lifecycle. It carries the
//! loop's phase, the stop signal, and a running event count.
//!
//! # Architecture
//!
//! The phase and counter are atomics so observers never contend with the
//! loop. The stop signal is a [`CancellationToken`]: the loop awaits it
//! alongside its tick sleep, so a stop request interrupts the sleep
//! instead of waiting it out.
//!
//! The phase only moves forward:
//!
//! ```text
//! Idle -> Running -> Stopping -> Stopped
//! ```

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Where the producer loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProducerPhase {
    /// Created, loop not yet entered.
    Idle = 0,
    /// Producing events.
    Running = 1,
    /// Stop observed; no further events will be produced.
    Stopping = 2,
    /// Loop has returned.
    Stopped = 3,
}

impl ProducerPhase {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Why the producer loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// [`ProducerControl::request_stop`] was called.
    StopRequested,
    /// The configured `max_events` bound was reached.
    EventLimitReached,
}

/// Shared producer control state.
#[derive(Debug)]
pub struct ProducerControl {
    /// Current [`ProducerPhase`], stored as its discriminant.
    phase: AtomicU8,

    /// Cancelled once a stop is requested.
    stop: CancellationToken,

    /// Events produced so far.
    events_produced: AtomicU64,

    /// Wall-clock time the loop entered `Running`.
    started_at: OnceLock<DateTime<Utc>>,
}

impl ProducerControl {
    /// Create control state in the [`ProducerPhase::Idle`] phase.
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(ProducerPhase::Idle as u8),
            stop: CancellationToken::new(),
            events_produced: AtomicU64::new(0),
            started_at: OnceLock::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Phase
    // -----------------------------------------------------------------------

    /// Current phase.
    pub fn phase(&self) -> ProducerPhase {
        ProducerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Move `Idle -> Running`. Returns the observed phase on failure.
    pub(crate) fn begin(&self) -> Result<(), ProducerPhase> {
        self.phase
            .compare_exchange(
                ProducerPhase::Idle as u8,
                ProducerPhase::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_prev| {
                let _ = self.started_at.set(Utc::now());
            })
            .map_err(ProducerPhase::from_u8)
    }

    /// Move `Running -> Stopping`.
    pub(crate) fn enter_stopping(&self) {
        self.advance_to(ProducerPhase::Stopping);
    }

    /// Move to `Stopped`.
    pub(crate) fn finish(&self) {
        self.advance_to(ProducerPhase::Stopped);
    }

    fn advance_to(&self, next: ProducerPhase) {
        self.phase.fetch_max(next as u8, Ordering::AcqRel);
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Ask the loop to stop. Idempotent.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Resolves once a stop has been requested.
    pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
        self.stop.cancelled()
    }

    // -----------------------------------------------------------------------
    // Counters
    // -----------------------------------------------------------------------

    /// Number of events produced so far.
    pub fn events_produced(&self) -> u64 {
        self.events_produced.load(Ordering::Acquire)
    }

    pub(crate) fn record_event(&self) -> u64 {
        self.events_produced
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1)
    }

    /// When the loop started running, if it has.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at.get().copied()
    }
}

impl Default for ProducerControl {
    fn default() -> Self {
        Self::new()
    }
}
