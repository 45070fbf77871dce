//! Startup and shutdown ordering for one generator run.
//!
//! # Startup
//!
//! 1. Validate the rate and period.
//! 2. If broadcast is enabled, bind the listener. A bind failure returns
//!    here and the producer never starts.
//! 3. Assemble the sinks and spawn the producer task.
//!
//! # Shutdown
//!
//! 1. Request a producer stop (or let it reach its event limit) and await
//!    the task.
//! 2. Close the listener and drain connections.
//!
//! Every step runs even if an earlier one failed, so the port is always
//! released before [`RunningGenerator::wait`] returns.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use eventcast_broadcast::{
    BroadcastRegistry, BroadcastSink, ConnectionAcceptor, DrainReport, ListenerHandle,
};
use eventcast_core::config::GeneratorConfig;
use eventcast_core::control::ProducerControl;
use eventcast_core::producer::{self, ProducerError, ProducerSettings, ProducerSummary};
use eventcast_core::rate::MIN_TICK_DELAY;
use eventcast_core::sink::{ConsoleSink, EventSink};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::GeneratorError;

/// What a completed run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Producer loop outcome.
    pub producer: ProducerSummary,
    /// Address the broadcast listener was bound to, if enabled.
    pub listen_addr: Option<SocketAddr>,
    /// Connection drain outcome, if broadcast was enabled.
    pub drain: Option<DrainReport>,
}

/// A configured, not yet started generator.
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    control: Arc<ProducerControl>,
}

impl Generator {
    /// Prepare a run from `config`.
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            control: Arc::new(ProducerControl::new()),
        }
    }

    /// Shared control state for the producer this generator will run.
    pub fn control(&self) -> Arc<ProducerControl> {
        Arc::clone(&self.control)
    }

    /// Bind the listener (if enabled) and start producing.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Rate`] for an unusable period and
    /// [`GeneratorError::Bind`] if the listener cannot bind. In both cases
    /// no event is produced.
    pub async fn start(self) -> Result<RunningGenerator, GeneratorError> {
        let rate = self.config.producer.tick_rate()?;
        if rate.is_fallback() {
            warn!(
                rate = rate.rate(),
                min_delay_ms = MIN_TICK_DELAY.as_millis(),
                "Rate is not positive, using minimum tick delay"
            );
        } else if rate.is_capped() {
            warn!(
                rate = rate.rate(),
                min_delay_ms = MIN_TICK_DELAY.as_millis(),
                "Rate exceeds one event per tick delay, capping"
            );
        }

        // --- Bind before anything produces ---
        let listener = if self.config.broadcast.enabled {
            let acceptor = ConnectionAcceptor::from_config(&self.config.broadcast);
            Some(acceptor.start(&self.config.broadcast.bind_address()).await?)
        } else {
            None
        };

        // --- Sinks ---
        let mut sinks: Vec<Box<dyn EventSink>> = Vec::new();
        if self.config.producer.console {
            sinks.push(Box::new(ConsoleSink::stdout()));
        }
        if let Some(handle) = &listener {
            sinks.push(Box::new(BroadcastSink::new(Arc::clone(handle.registry()))));
        }
        let sink_names: Vec<&'static str> = sinks.iter().map(|sink| sink.name()).collect();
        info!(sinks = ?sink_names, "Sinks configured");

        // --- Producer task ---
        let settings = ProducerSettings {
            rate,
            max_events: self.config.producer.max_events,
        };
        let control = Arc::clone(&self.control);
        let producer = tokio::spawn(async move {
            producer::run_producer(&settings, &control, &mut sinks).await
        });

        Ok(RunningGenerator {
            control: self.control,
            listener,
            producer,
        })
    }
}

/// A generator whose producer is running.
#[derive(Debug)]
pub struct RunningGenerator {
    control: Arc<ProducerControl>,
    listener: Option<ListenerHandle>,
    producer: JoinHandle<Result<ProducerSummary, ProducerError>>,
}

impl RunningGenerator {
    /// Shared producer control state.
    pub const fn control(&self) -> &Arc<ProducerControl> {
        &self.control
    }

    /// Address the broadcast listener is bound to, if enabled.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(ListenerHandle::local_addr)
    }

    /// The broadcast registry, if enabled.
    pub fn registry(&self) -> Option<&Arc<BroadcastRegistry>> {
        self.listener.as_ref().map(ListenerHandle::registry)
    }

    /// Run until `shutdown` resolves or the producer ends on its own, then
    /// shut everything down.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Producer`] or
    /// [`GeneratorError::ProducerTask`] if the producer failed. The
    /// listener is drained either way.
    pub async fn wait<S>(self, shutdown: S) -> Result<RunSummary, GeneratorError>
    where
        S: Future<Output = ()>,
    {
        let Self {
            control,
            listener,
            mut producer,
        } = self;

        let joined = tokio::select! {
            joined = &mut producer => joined,
            () = shutdown => {
                info!("Shutdown requested, stopping producer");
                control.request_stop();
                producer.await
            }
        };

        finish(joined, listener).await
    }

    /// Stop the producer now and shut everything down.
    ///
    /// # Errors
    ///
    /// Same as [`wait`](Self::wait).
    pub async fn stop(self) -> Result<RunSummary, GeneratorError> {
        self.control.request_stop();
        self.wait(std::future::ready(())).await
    }
}

async fn finish(
    joined: Result<Result<ProducerSummary, ProducerError>, tokio::task::JoinError>,
    listener: Option<ListenerHandle>,
) -> Result<RunSummary, GeneratorError> {
    let listen_addr = listener.as_ref().map(ListenerHandle::local_addr);
    let drain = match listener {
        Some(handle) => Some(handle.shutdown().await),
        None => None,
    };

    let producer = joined??;
    info!(
        total_events = producer.total_events,
        reason = ?producer.end_reason,
        "Generator stopped"
    );

    Ok(RunSummary {
        producer,
        listen_addr,
        drain,
    })
}

/// Start a generator from `config` and run it until `shutdown` resolves.
///
/// # Errors
///
/// See [`Generator::start`] and [`RunningGenerator::wait`].
pub async fn run<S>(config: GeneratorConfig, shutdown: S) -> Result<RunSummary, GeneratorError>
where
    S: Future<Output = ()>,
{
    Generator::new(config).start().await?.wait(shutdown).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use eventcast_core::control::{ProducerPhase, StopReason};

    use super::*;

    fn quiet_config(max_events: u64) -> GeneratorConfig {
        let mut config = GeneratorConfig::default();
        config.producer.console = false;
        config.producer.rate = 1000.0;
        config.producer.max_events = max_events;
        config
    }

    #[tokio::test]
    async fn run_without_sinks_reaches_event_limit() {
        let summary = run(quiet_config(4), std::future::pending()).await.unwrap();
        assert_eq!(summary.producer.end_reason, StopReason::EventLimitReached);
        assert_eq!(summary.producer.total_events, 4);
        assert!(summary.drain.is_none());
        assert!(summary.listen_addr.is_none());
    }

    #[tokio::test]
    async fn invalid_period_fails_before_producing() {
        let mut config = quiet_config(0);
        config.producer.period_seconds = 0.0;
        let generator = Generator::new(config);
        let control = generator.control();

        let result = generator.start().await;
        assert!(matches!(result, Err(GeneratorError::Rate { .. })));
        assert_eq!(control.phase(), ProducerPhase::Idle);
    }

    #[tokio::test]
    async fn stop_ends_an_unbounded_run() {
        let running = Generator::new(quiet_config(0)).start().await.unwrap();
        while running.control().events_produced() == 0 {
            tokio::task::yield_now().await;
        }

        let summary = running.stop().await.unwrap();
        assert_eq!(summary.producer.end_reason, StopReason::StopRequested);
        assert!(summary.producer.total_events >= 1);
    }
}
