//! Normalized rate records and per-cycle batches.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::currency::CurrencyCode;
use crate::error::RateError;
use crate::identifiers::CycleId;
use crate::time::Timestamp;

/// Origin of a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateSource {
    /// Bulk JSON rate table.
    Api,
    /// Scraped exchange-kiosk page.
    Scrape,
}

impl RateSource {
    /// Both sources, in ingestion order.
    pub const ALL: [RateSource; 2] = [RateSource::Api, RateSource::Scrape];

    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::Api => "api",
            RateSource::Scrape => "scrape",
        }
    }
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric fields of a record. The variant fixes the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateValues {
    Api {
        /// Units of currency per 1 USD.
        usd_to_currency: f64,
        /// Units of currency per 1 EUR, when the EUR table lists the code.
        euro_to_currency: Option<f64>,
    },
    Scrape {
        /// Units of currency per 1 AED when the kiosk buys.
        buy_aed: f64,
        /// Units of currency per 1 AED when the kiosk sells.
        sell_aed: f64,
    },
}

impl RateValues {
    /// Source these values belong to.
    pub fn source(&self) -> RateSource {
        match self {
            RateValues::Api { .. } => RateSource::Api,
            RateValues::Scrape { .. } => RateSource::Scrape,
        }
    }

    /// Exact equality of every numeric field.
    ///
    /// Float values go through the store unchanged, so bit-for-bit equality is
    /// the right notion of "unchanged".
    pub fn same_values(&self, other: &RateValues) -> bool {
        match (self, other) {
            (
                RateValues::Api { usd_to_currency: a_usd, euro_to_currency: a_eur },
                RateValues::Api { usd_to_currency: b_usd, euro_to_currency: b_eur },
            ) => a_usd == b_usd && a_eur == b_eur,
            (
                RateValues::Scrape { buy_aed: a_buy, sell_aed: a_sell },
                RateValues::Scrape { buy_aed: b_buy, sell_aed: b_sell },
            ) => a_buy == b_buy && a_sell == b_sell,
            _ => false,
        }
    }
}

/// One currency's rate from one source, stamped with its cycle time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    /// Normalized currency code.
    pub currency_code: CurrencyCode,
    /// Source-specific numeric fields.
    pub values: RateValues,
    /// Cycle timestamp of the last change.
    pub observed_at: Timestamp,
}

impl RateRecord {
    /// Create an API record.
    pub fn api(
        currency_code: CurrencyCode,
        usd_to_currency: f64,
        euro_to_currency: Option<f64>,
        observed_at: Timestamp,
    ) -> Self {
        Self {
            currency_code,
            values: RateValues::Api {
                usd_to_currency,
                euro_to_currency,
            },
            observed_at,
        }
    }

    /// Create a scrape record.
    ///
    /// Returns `None` unless both values are finite and strictly positive.
    pub fn scrape(
        currency_code: CurrencyCode,
        buy_aed: f64,
        sell_aed: f64,
        observed_at: Timestamp,
    ) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(buy_aed) || !valid(sell_aed) {
            return None;
        }
        Some(Self {
            currency_code,
            values: RateValues::Scrape { buy_aed, sell_aed },
            observed_at,
        })
    }

    /// Source of this record.
    pub fn source(&self) -> RateSource {
        self.values.source()
    }
}

/// All records one source produced in one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateBatch {
    /// Source of every record in the batch.
    pub source: RateSource,
    /// Cycle that produced the batch.
    pub cycle_id: CycleId,
    /// Cycle timestamp.
    pub cycle_at: Timestamp,
    records: Vec<RateRecord>,
}

impl RateBatch {
    /// Create an empty batch.
    pub fn new(source: RateSource, cycle_id: CycleId, cycle_at: Timestamp) -> Self {
        Self {
            source,
            cycle_id,
            cycle_at,
            records: Vec::new(),
        }
    }

    /// Append a record. Records of the other source are refused.
    pub fn push(&mut self, record: RateRecord) -> Result<(), RateError> {
        if record.source() != self.source {
            return Err(RateError::InvalidInput(format!(
                "{} record for {} pushed into {} batch",
                record.source(),
                record.currency_code,
                self.source
            )));
        }
        self.records.push(record);
        Ok(())
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[RateRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
