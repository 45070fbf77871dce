//! End-to-end tests for the generator lifecycle over loopback TCP.
//!
//! Console output is disabled in every test; events are observed through
//! broadcast clients and the run summary.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use eventcast_core::config::GeneratorConfig;
use eventcast_core::control::{ProducerPhase, StopReason};
use eventcast_generator::{Generator, GeneratorError, run};
use eventcast_types::{Event, EventKind};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Upper bound on every wait in this file.
const WAIT: Duration = Duration::from_secs(5);

fn broadcast_config(rate: f64) -> GeneratorConfig {
    let mut config = GeneratorConfig::default();
    config.producer.console = false;
    config.producer.rate = rate;
    config.broadcast.enabled = true;
    config.broadcast.port = 0;
    config.broadcast.shutdown_grace_ms = 2000;
    config
}

#[tokio::test]
async fn bind_failure_means_no_events() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = broadcast_config(1000.0);
    config.broadcast.port = occupied.local_addr().unwrap().port();

    let generator = Generator::new(config);
    let control = generator.control();
    let result = generator.start().await;

    assert!(matches!(result, Err(GeneratorError::Bind { .. })));
    assert_eq!(control.phase(), ProducerPhase::Idle);
    assert_eq!(control.events_produced(), 0);
}

#[tokio::test]
async fn client_receives_well_formed_events() {
    // 4.0 / 40.0 = 100ms per tick.
    let running = Generator::new(broadcast_config(40.0)).start().await.unwrap();
    let addr = running.listen_addr().expect("broadcast enabled");
    let mut client = BufReader::new(TcpStream::connect(addr).await.unwrap());

    for _ in 0..3 {
        let mut line = String::new();
        tokio::time::timeout(WAIT, client.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        assert!(line.ends_with('\n'));
        let event: Event = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(event.id.len(), 8);
        assert!(event.ts.ends_with('Z'));
        assert!((0.0..=100.0).contains(&event.value));
        assert!(EventKind::ALL.contains(&event.kind));
    }

    let summary = tokio::time::timeout(WAIT, running.stop())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.producer.end_reason, StopReason::StopRequested);
    assert!(summary.producer.total_events >= 3);
}

#[tokio::test]
async fn shutdown_signal_drains_connected_client() {
    let running = Generator::new(broadcast_config(40.0)).start().await.unwrap();
    let addr = running.listen_addr().unwrap();
    let registry = std::sync::Arc::clone(running.registry().unwrap());
    let mut client = TcpStream::connect(addr).await.unwrap();

    tokio::time::timeout(WAIT, async {
        while registry.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let waiter = tokio::spawn(running.wait(async move {
        let _ = stop_rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(250)).await;
    stop_tx.send(()).unwrap();

    let summary = tokio::time::timeout(WAIT, waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(summary.producer.end_reason, StopReason::StopRequested);
    let drain = summary.drain.unwrap();
    assert_eq!(drain.closed, 1);
    assert_eq!(drain.forced, 0);
    assert!(registry.is_empty());

    // Whatever lines were sent, the stream ends in an orderly EOF.
    let mut rest = Vec::new();
    tokio::time::timeout(WAIT, client.read_to_end(&mut rest))
        .await
        .unwrap()
        .expect("orderly close");
    let text = String::from_utf8(rest).unwrap();
    assert!(text.is_empty() || text.ends_with('\n'));

    assert!(TcpListener::bind(addr).await.is_ok());
}

#[tokio::test]
async fn event_limit_ends_run_and_releases_port() {
    let mut config = broadcast_config(1000.0);
    config.producer.max_events = 5;

    let summary = tokio::time::timeout(WAIT, run(config, std::future::pending()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.producer.end_reason, StopReason::EventLimitReached);
    assert_eq!(summary.producer.total_events, 5);
    let addr = summary.listen_addr.unwrap();
    assert_eq!(summary.drain.unwrap().forced, 0);
    assert!(TcpListener::bind(addr).await.is_ok());
}
