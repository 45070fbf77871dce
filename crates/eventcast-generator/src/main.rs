//! Synthetic event generator binary.
//!
//! Produces one JSON event per tick, echoes it to stdout, and optionally
//! broadcasts it to every client connected to a TCP listener. Runs until
//! interrupted (SIGINT, SIGTERM, SIGQUIT, or Ctrl-C) or until
//! `--max-events` is reached.
//!
//! # Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load configuration (defaults, YAML file, `EVENTCAST_*` env, flags)
//! 3. Initialize structured logging on stderr
//! 4. Bind the listener if `--socket` is set
//! 5. Run the producer until a shutdown signal
//! 6. Drain connections and exit

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use eventcast_core::config::GeneratorConfig;
use eventcast_core::control::StopReason;
use eventcast_generator::{GeneratorError, RunSummary};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments. Every flag overrides the config file.
#[derive(Debug, Parser)]
#[command(name = "eventcast-generator", version, about)]
struct Cli {
    /// Events per second; capped at one event per millisecond [default: 2.0]
    #[arg(long, allow_negative_numbers = true)]
    rate: Option<f64>,

    /// Scaling period in seconds; the tick interval is period / rate [default: 4.0]
    #[arg(long, value_name = "SECONDS")]
    period: Option<f64>,

    /// Do not echo events to stdout
    #[arg(long)]
    no_console: bool,

    /// Broadcast events to TCP clients
    #[arg(long)]
    socket: bool,

    /// Listen host for --socket [default: 127.0.0.1]
    #[arg(long)]
    host: Option<String>,

    /// Listen port for --socket [default: 9999]
    #[arg(long)]
    port: Option<u16>,

    /// Stop after this many events (0 = unlimited)
    #[arg(long, value_name = "N")]
    max_events: Option<u64>,

    /// YAML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Layer the flags over the file and environment.
    fn load_config(&self) -> anyhow::Result<GeneratorConfig> {
        let mut config = match &self.config {
            Some(path) => GeneratorConfig::from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => {
                let mut config = GeneratorConfig::default();
                config
                    .apply_env_overrides()
                    .context("reading EVENTCAST_* environment")?;
                config
            }
        };

        if let Some(rate) = self.rate {
            config.producer.rate = rate;
        }
        if let Some(period) = self.period {
            config.producer.period_seconds = period;
        }
        if self.no_console {
            config.producer.console = false;
        }
        if let Some(max_events) = self.max_events {
            config.producer.max_events = max_events;
        }
        if self.socket {
            config.broadcast.enabled = true;
        }
        if let Some(host) = &self.host {
            config.broadcast.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.broadcast.port = port;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Logs go to stderr; stdout carries the event stream.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(
        rate = config.producer.rate,
        period_seconds = config.producer.period_seconds,
        console = config.producer.console,
        broadcast = config.broadcast.enabled,
        max_events = config.producer.max_events,
        "eventcast-generator starting"
    );

    let result = eventcast_generator::run(config, shutdown_signal()).await;
    Ok(report(result))
}

/// Log how the run ended and pick the exit code. Run failures are reported
/// here only, not again by `main`'s error return.
fn report(result: Result<RunSummary, GeneratorError>) -> ExitCode {
    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Generator failed");
            return ExitCode::FAILURE;
        }
    };

    if summary.producer.end_reason == StopReason::StopRequested {
        info!(total_events = summary.producer.total_events, "Stopped by user");
    }
    if let Some(drain) = summary.drain {
        info!(closed = drain.closed, forced = drain.forced, "Connections drained");
    }
    ExitCode::SUCCESS
}

/// Resolves on the first termination signal.
async fn shutdown_signal() {
    if let Err(e) = wait_for_signal().await {
        // Without signal handlers the process can only end via --max-events.
        warn!(error = %e, "Failed to install signal handlers");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
        _ = sigquit.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_flags() {
        let cli = Cli::try_parse_from(["eventcast-generator"]).unwrap();
        let config = cli.load_config().unwrap();
        assert!(config.producer.console);
        assert!(!config.broadcast.enabled);
        assert_eq!(config.producer.max_events, 0);
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "eventcast-generator",
            "--rate",
            "8",
            "--no-console",
            "--socket",
            "--host",
            "0.0.0.0",
            "--port",
            "7777",
            "--max-events",
            "3",
            "--period",
            "2",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.producer.rate, 8.0);
        assert_eq!(config.producer.period_seconds, 2.0);
        assert!(!config.producer.console);
        assert_eq!(config.producer.max_events, 3);
        assert!(config.broadcast.enabled);
        assert_eq!(config.broadcast.bind_address(), "0.0.0.0:7777");
    }

    #[test]
    fn negative_rate_is_accepted_by_the_parser() {
        let cli = Cli::try_parse_from(["eventcast-generator", "--rate", "-1"]).unwrap();
        assert_eq!(cli.rate, Some(-1.0));
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(Cli::try_parse_from(["eventcast-generator", "--port", "70000"]).is_err());
    }

    #[test]
    fn run_failure_maps_to_failure_exit_code() {
        let err = GeneratorError::Bind {
            source: eventcast_broadcast::BindError::Bind {
                address: String::from("127.0.0.1:9999"),
                source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
            },
        };
        let code = report(Err(err));
        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::FAILURE));
    }

    #[test]
    fn completed_run_maps_to_success_exit_code() {
        let summary = RunSummary {
            producer: eventcast_core::producer::ProducerSummary {
                end_reason: StopReason::EventLimitReached,
                total_events: 3,
            },
            listen_addr: None,
            drain: None,
        };
        let code = report(Ok(summary));
        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::SUCCESS));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from([
            "eventcast-generator",
            "--config",
            "/nonexistent/eventcast.yaml",
        ])
        .unwrap();
        assert!(cli.load_config().is_err());
    }
}
