//! The rate-limited producer loop.
//!
//! [`run_producer`] is the driver: each tick it builds one event,
//! serializes it to a single JSON line, hands the line to every sink, then
//! sleeps until the next tick is due. The sleep races the stop signal in
//! [`ProducerControl`], so a stop request takes effect within one tick.
//!
//! The sleep is measured from the start of the tick, so time spent in the
//! sinks is subtracted from the wait. A tick that overruns its interval is
//! followed immediately by the next one.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use eventcast_types::Event;

use crate::control::{ProducerControl, ProducerPhase, StopReason};
use crate::factory;
use crate::rate::TickRate;
use crate::sink::EventSink;

/// Errors that prevent the producer loop from running.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// The control state was not [`ProducerPhase::Idle`].
    #[error("producer already started (phase: {phase:?})")]
    AlreadyStarted {
        /// The phase observed when the loop tried to start.
        phase: ProducerPhase,
    },
}

/// Loop bounds and pacing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProducerSettings {
    /// Tick pacing.
    pub rate: TickRate,
    /// Stop after this many events (0 = unlimited).
    pub max_events: u64,
}

/// Result of a producer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerSummary {
    /// Why the loop ended.
    pub end_reason: StopReason,
    /// Total number of events produced.
    pub total_events: u64,
}

/// Run the producer loop with the default event factory.
///
/// # Errors
///
/// Returns [`ProducerError::AlreadyStarted`] if `control` has already
/// been used by another run.
pub async fn run_producer(
    settings: &ProducerSettings,
    control: &ProducerControl,
    sinks: &mut [Box<dyn EventSink>],
) -> Result<ProducerSummary, ProducerError> {
    run_producer_with(settings, control, sinks, factory::make_event).await
}

/// Run the producer loop, drawing events from `next_event`.
///
/// # Errors
///
/// Returns [`ProducerError::AlreadyStarted`] if `control` has already
/// been used by another run.
pub async fn run_producer_with<F>(
    settings: &ProducerSettings,
    control: &ProducerControl,
    sinks: &mut [Box<dyn EventSink>],
    mut next_event: F,
) -> Result<ProducerSummary, ProducerError>
where
    F: FnMut() -> Event,
{
    control
        .begin()
        .map_err(|phase| ProducerError::AlreadyStarted { phase })?;

    let interval = settings.rate.interval();
    info!(
        rate = settings.rate.rate(),
        interval_ms = interval.as_millis(),
        max_events = settings.max_events,
        sinks = sinks.len(),
        "Producer starting"
    );

    let mut total_events: u64 = 0;

    let end_reason = loop {
        // --- Check stop request (before tick) ---
        if control.is_stop_requested() {
            break StopReason::StopRequested;
        }

        let tick_started = Instant::now();

        // --- Generate and deliver ---
        let event = next_event();
        match event.to_line() {
            Ok(line) => {
                for sink in sinks.iter_mut() {
                    sink.deliver(&line).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to serialize event, skipping tick");
            }
        }

        total_events = control.record_event();
        debug!(total_events, kind = %event.kind, "Event produced");

        // --- Check event limit (after tick) ---
        if settings.max_events > 0 && total_events >= settings.max_events {
            info!(max_events = settings.max_events, "Event limit reached");
            break StopReason::EventLimitReached;
        }

        // --- Sleep for the rest of the interval ---
        let deadline = tick_started.checked_add(interval).unwrap_or(tick_started);
        tokio::select! {
            biased;
            () = control.stopped() => break StopReason::StopRequested,
            () = tokio::time::sleep_until(deadline) => {}
        }
    };

    control.enter_stopping();
    info!(reason = ?end_reason, total_events, "Producer stopping");
    control.finish();

    Ok(ProducerSummary {
        end_reason,
        total_events,
    })
}
