//! Rate store abstraction.

use async_trait::async_trait;

use ratekeeper_common::{CurrencyCode, RateBatch, RateRecord, RateSource, RateValues};

use crate::error::StoreResult;

/// What an upsert did with each record of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Codes seen for the first time.
    pub inserted: usize,
    /// Codes whose values changed.
    pub updated: usize,
    /// Codes whose values were identical; timestamp left as is.
    pub unchanged: usize,
}

impl UpsertSummary {
    /// Rows written (inserted or updated).
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }

    pub(crate) fn record(&mut self, action: UpsertAction) {
        match action {
            UpsertAction::Inserted => self.inserted += 1,
            UpsertAction::Updated => self.updated += 1,
            UpsertAction::Unchanged => self.unchanged += 1,
        }
    }
}

/// Outcome of reconciling one record against the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Inserted,
    Updated,
    Unchanged,
}

impl UpsertAction {
    /// Decide what to do with `incoming` given the currently stored values.
    pub fn reconcile(existing: Option<&RateValues>, incoming: &RateValues) -> Self {
        match existing {
            None => UpsertAction::Inserted,
            Some(current) if current.same_values(incoming) => UpsertAction::Unchanged,
            Some(_) => UpsertAction::Updated,
        }
    }
}

/// Latest-value store keyed by `(source, currency code)`.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Reconcile a batch into the source's table.
    ///
    /// Insert unknown codes, skip codes whose numeric values are unchanged,
    /// update everything else. The batch is applied all-or-nothing.
    async fn upsert(&self, batch: &RateBatch) -> StoreResult<UpsertSummary>;

    /// Exact-match read of the latest record for `code`.
    async fn lookup(&self, source: RateSource, code: &CurrencyCode) -> StoreResult<Option<RateRecord>>;

    /// Number of rows held for `source`.
    async fn count(&self, source: RateSource) -> StoreResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile() {
        let a = RateValues::Api {
            usd_to_currency: 3.67,
            euro_to_currency: Some(4.0),
        };
        let b = RateValues::Api {
            usd_to_currency: 3.67,
            euro_to_currency: None,
        };

        assert_eq!(UpsertAction::reconcile(None, &a), UpsertAction::Inserted);
        assert_eq!(UpsertAction::reconcile(Some(&a), &a), UpsertAction::Unchanged);
        assert_eq!(UpsertAction::reconcile(Some(&a), &b), UpsertAction::Updated);
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = UpsertSummary::default();
        summary.record(UpsertAction::Inserted);
        summary.record(UpsertAction::Updated);
        summary.record(UpsertAction::Unchanged);

        assert_eq!(summary.written(), 2);
        assert_eq!(summary, UpsertSummary { inserted: 1, updated: 1, unchanged: 1 });
    }
}
