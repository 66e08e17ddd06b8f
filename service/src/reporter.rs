//! Delivery of cycle outcomes to whoever is listening.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ratekeeper_common::RateSource;

use crate::outcome::IngestionOutcome;

/// Sink for ingestion outcomes.
#[async_trait]
pub trait OutcomeReporter: Send + Sync {
    /// Deliver the outcome of a finished cycle.
    async fn report(&self, outcome: &IngestionOutcome);
}

/// Writes every outcome to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

#[async_trait]
impl OutcomeReporter for TracingReporter {
    async fn report(&self, outcome: &IngestionOutcome) {
        for source in RateSource::ALL {
            let result = outcome.source(source);
            if result.is_empty() {
                warn!(cycle_id = %outcome.cycle_id, source = %source, "No rates collected");
            }
            for failure in &result.failures {
                warn!(
                    cycle_id = %outcome.cycle_id,
                    source = %source,
                    kind = %failure.kind,
                    code = %failure.code,
                    message = %failure.message,
                    "Source failure"
                );
            }
        }

        info!(
            cycle_id = %outcome.cycle_id,
            cycle_at = %outcome.cycle_at,
            api_collected = outcome.api.collected,
            api_written = outcome.api.written(),
            scrape_collected = outcome.scrape.collected,
            scrape_written = outcome.scrape.written(),
            partial = outcome.is_partial(),
            unavailable = outcome.is_unavailable(),
            "Ingestion cycle finished"
        );
    }
}

/// Forwards outcomes over a channel, e.g. to a chat front end.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::Sender<IngestionOutcome>,
}

impl ChannelReporter {
    /// Create a reporter and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<IngestionOutcome>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl OutcomeReporter for ChannelReporter {
    async fn report(&self, outcome: &IngestionOutcome) {
        if self.tx.send(outcome.clone()).await.is_err() {
            debug!(cycle_id = %outcome.cycle_id, "Outcome receiver dropped");
        }
    }
}
