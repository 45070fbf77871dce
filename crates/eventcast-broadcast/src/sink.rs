//! Producer-side adapter for the registry.

use std::sync::Arc;

use async_trait::async_trait;
use eventcast_core::sink::EventSink;
use tracing::debug;

use crate::registry::{BroadcastRegistry, BroadcastReport};

/// An [`EventSink`] that broadcasts each line to every live connection.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    registry: Arc<BroadcastRegistry>,
    last_report: BroadcastReport,
}

impl BroadcastSink {
    /// Broadcast through `registry`.
    pub fn new(registry: Arc<BroadcastRegistry>) -> Self {
        Self {
            registry,
            last_report: BroadcastReport::default(),
        }
    }

    /// Counts from the most recent delivery.
    pub const fn last_report(&self) -> BroadcastReport {
        self.last_report
    }
}

#[async_trait]
impl EventSink for BroadcastSink {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn deliver(&mut self, line: &str) {
        let report = self.registry.broadcast(line).await;
        debug!(
            attempted = report.attempted,
            delivered = report.delivered,
            evicted = report.evicted,
            "Broadcast complete"
        );
        self.last_report = report;
    }
}
