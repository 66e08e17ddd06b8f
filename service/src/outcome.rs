//! Per-cycle ingestion outcome.

use ratekeeper_common::{CycleId, ErrorKind, FailureReport, RateSource, Timestamp};
use ratekeeper_store::UpsertSummary;
use serde::Serialize;

/// What one source contributed to a cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceOutcome {
    /// Records collected from the source.
    pub collected: usize,
    /// Rows inserted.
    pub inserted: usize,
    /// Rows updated.
    pub updated: usize,
    /// Rows left untouched because nothing changed.
    pub unchanged: usize,
    /// Classified failures, in the order they happened.
    pub failures: Vec<FailureReport>,
}

impl SourceOutcome {
    /// Rows inserted or updated.
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }

    /// Check if the source produced no records.
    pub fn is_empty(&self) -> bool {
        self.collected == 0
    }

    /// Check if collected records could not be stored.
    pub fn has_hard_failure(&self) -> bool {
        self.failures.iter().any(|f| f.kind == ErrorKind::Persistence)
    }

    pub(crate) fn apply(&mut self, summary: UpsertSummary) {
        self.inserted = summary.inserted;
        self.updated = summary.updated;
        self.unchanged = summary.unchanged;
    }
}

/// Summary of one ingestion cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionOutcome {
    /// Cycle identifier.
    pub cycle_id: CycleId,
    /// Cycle timestamp.
    pub cycle_at: Timestamp,
    /// API source outcome.
    pub api: SourceOutcome,
    /// Scrape source outcome.
    pub scrape: SourceOutcome,
}

impl IngestionOutcome {
    /// Outcome of `source`.
    pub fn source(&self, source: RateSource) -> &SourceOutcome {
        match source {
            RateSource::Api => &self.api,
            RateSource::Scrape => &self.scrape,
        }
    }

    /// Exactly one source yielded no records.
    pub fn is_partial(&self) -> bool {
        self.api.is_empty() != self.scrape.is_empty()
    }

    /// Neither source yielded records.
    pub fn is_unavailable(&self) -> bool {
        self.api.is_empty() && self.scrape.is_empty()
    }

    /// Rows written across both sources.
    pub fn written(&self) -> usize {
        self.api.written() + self.scrape.written()
    }
}
