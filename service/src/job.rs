//! One ingestion cycle: collect, reconcile, report.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use ratekeeper_collector::{Collector, CycleBatches, SourceFailure};
use ratekeeper_common::{FailureReport, RateBatch, RateError};
use ratekeeper_store::RateStore;

use crate::outcome::{IngestionOutcome, SourceOutcome};
use crate::reporter::OutcomeReporter;

/// Runs collection cycles into a store.
pub struct IngestionJob {
    collector: Collector,
    store: Arc<dyn RateStore>,
    reporter: Arc<dyn OutcomeReporter>,
}

impl IngestionJob {
    /// Create a new job.
    pub fn new(collector: Collector, store: Arc<dyn RateStore>, reporter: Arc<dyn OutcomeReporter>) -> Self {
        Self {
            collector,
            store,
            reporter,
        }
    }

    /// Run one cycle.
    ///
    /// Never fails: source and storage failures are folded into the outcome.
    #[instrument(skip(self))]
    pub async fn run(&self) -> IngestionOutcome {
        let CycleBatches {
            cycle_id,
            cycle_at,
            api,
            scrape,
            failures,
        } = self.collector.run_cycle().await;

        let api = self.persist(&api, &failures).await;
        let scrape = self.persist(&scrape, &failures).await;

        let outcome = IngestionOutcome {
            cycle_id,
            cycle_at,
            api,
            scrape,
        };

        self.reporter.report(&outcome).await;
        outcome
    }

    async fn persist(&self, batch: &RateBatch, failures: &[SourceFailure]) -> SourceOutcome {
        let mut outcome = SourceOutcome {
            collected: batch.len(),
            failures: failures
                .iter()
                .filter(|f| f.source == batch.source)
                .map(|f| f.report.clone())
                .collect(),
            ..Default::default()
        };

        if batch.is_empty() {
            return outcome;
        }

        match self.store.upsert(batch).await {
            Ok(summary) => {
                info!(
                    source = %batch.source,
                    inserted = summary.inserted,
                    updated = summary.updated,
                    unchanged = summary.unchanged,
                    "Stored rate batch"
                );
                outcome.apply(summary);
            }
            Err(e) => {
                let err = RateError::from(e);
                warn!(source = %batch.source, error = %err, "Failed to store rate batch");
                outcome.failures.push(FailureReport::from(&err));
            }
        }

        outcome
    }

    /// Store the job writes to.
    pub fn store(&self) -> &Arc<dyn RateStore> {
        &self.store
    }
}
