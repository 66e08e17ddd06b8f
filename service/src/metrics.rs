//! In-process counters for ingestion and lookups.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ratekeeper_common::RateSource;
use serde::Serialize;

use crate::outcome::IngestionOutcome;

/// Service metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Completed ingestion cycles.
    pub cycles_total: AtomicU64,
    /// Cycles where exactly one source produced nothing.
    pub cycles_partial: AtomicU64,
    /// Cycles where neither source produced anything.
    pub cycles_unavailable: AtomicU64,
    /// Cycles abandoned on timeout.
    pub cycles_timed_out: AtomicU64,
    /// API rows inserted or updated.
    pub api_rows_written: AtomicU64,
    /// Scrape rows inserted or updated.
    pub scrape_rows_written: AtomicU64,
    /// Rate lookups served.
    pub lookups_total: AtomicU64,
    /// Lookups that found a row.
    pub lookup_hits: AtomicU64,
    /// Lookups that found nothing or had a malformed code.
    pub lookup_misses: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished cycle.
    pub fn cycle_completed(&self, outcome: &IngestionOutcome) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
        if outcome.is_partial() {
            self.cycles_partial.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.is_unavailable() {
            self.cycles_unavailable.fetch_add(1, Ordering::Relaxed);
        }
        self.rows_written(RateSource::Api, outcome.api.written() as u64);
        self.rows_written(RateSource::Scrape, outcome.scrape.written() as u64);
    }

    /// Record a cycle abandoned on timeout.
    pub fn cycle_timed_out(&self) {
        self.cycles_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    fn rows_written(&self, source: RateSource, rows: u64) {
        let counter = match source {
            RateSource::Api => &self.api_rows_written,
            RateSource::Scrape => &self.scrape_rows_written,
        };
        counter.fetch_add(rows, Ordering::Relaxed);
    }

    /// Record a lookup and whether it found a row.
    pub fn lookup(&self, hit: bool) {
        self.lookups_total.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.lookup_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.lookup_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            cycles_partial: self.cycles_partial.load(Ordering::Relaxed),
            cycles_unavailable: self.cycles_unavailable.load(Ordering::Relaxed),
            cycles_timed_out: self.cycles_timed_out.load(Ordering::Relaxed),
            api_rows_written: self.api_rows_written.load(Ordering::Relaxed),
            scrape_rows_written: self.scrape_rows_written.load(Ordering::Relaxed),
            lookups_total: self.lookups_total.load(Ordering::Relaxed),
            lookup_hits: self.lookup_hits.load(Ordering::Relaxed),
            lookup_misses: self.lookup_misses.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub cycles_total: u64,
    pub cycles_partial: u64,
    pub cycles_unavailable: u64,
    pub cycles_timed_out: u64,
    pub api_rows_written: u64,
    pub scrape_rows_written: u64,
    pub lookups_total: u64,
    pub lookup_hits: u64,
    pub lookup_misses: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::SourceOutcome;
    use ratekeeper_common::{cycle_timestamp, CycleId};

    #[test]
    fn test_cycle_counters() {
        let metrics = Metrics::new();
        let outcome = IngestionOutcome {
            cycle_id: CycleId::new(),
            cycle_at: cycle_timestamp(),
            api: SourceOutcome::default(),
            scrape: SourceOutcome {
                collected: 3,
                inserted: 2,
                updated: 1,
                ..Default::default()
            },
        };

        metrics.cycle_completed(&outcome);
        metrics.cycle_timed_out();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles_total, 1);
        assert_eq!(snapshot.cycles_partial, 1);
        assert_eq!(snapshot.cycles_unavailable, 0);
        assert_eq!(snapshot.cycles_timed_out, 1);
        assert_eq!(snapshot.scrape_rows_written, 3);
        assert_eq!(snapshot.api_rows_written, 0);
    }

    #[test]
    fn test_lookup_counters() {
        let metrics = Metrics::new();
        metrics.lookup(true);
        metrics.lookup(false);
        metrics.lookup(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.lookups_total, 3);
        assert_eq!(snapshot.lookup_hits, 1);
        assert_eq!(snapshot.lookup_misses, 2);
    }
}
