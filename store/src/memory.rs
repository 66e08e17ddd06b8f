//! In-process rate store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use ratekeeper_common::{CurrencyCode, RateBatch, RateRecord, RateSource};

use crate::error::{StoreError, StoreResult};
use crate::repository::{RateStore, UpsertAction, UpsertSummary};

type Table = HashMap<CurrencyCode, RateRecord>;

/// Rate store held in memory, one locked table per source.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    api: Mutex<Table>,
    scrape: Mutex<Table>,
}

impl MemoryRateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, source: RateSource) -> &Mutex<Table> {
        match source {
            RateSource::Api => &self.api,
            RateSource::Scrape => &self.scrape,
        }
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn upsert(&self, batch: &RateBatch) -> StoreResult<UpsertSummary> {
        if let Some(stray) = batch.records().iter().find(|r| r.source() != batch.source) {
            return Err(StoreError::SourceMismatch {
                batch: batch.source,
                record: stray.source(),
            });
        }

        let mut table = self.table(batch.source).lock();
        let mut summary = UpsertSummary::default();

        for record in batch.records() {
            let existing = table.get(&record.currency_code).map(|r| &r.values);
            let action = UpsertAction::reconcile(existing, &record.values);
            if action != UpsertAction::Unchanged {
                table.insert(record.currency_code.clone(), record.clone());
            }
            summary.record(action);
        }

        Ok(summary)
    }

    async fn lookup(&self, source: RateSource, code: &CurrencyCode) -> StoreResult<Option<RateRecord>> {
        Ok(self.table(source).lock().get(code).cloned())
    }

    async fn count(&self, source: RateSource) -> StoreResult<u64> {
        Ok(self.table(source).lock().len() as u64)
    }
}
