//! Collection cycle orchestration.
//!
//! One cycle fetches the USD-base table, the EUR-base table and the kiosk
//! page concurrently, then shapes the results into one batch per source.

use ratekeeper_common::{cycle_timestamp, BaseCurrency, CycleId, RateBatch, RateRecord, RateSource, Timestamp};
use tracing::{info, instrument, warn};

use crate::api::{ApiRateClient, RateTable};
use crate::error::SourceFailure;
use crate::scrape::{KioskScrapeClient, ScrapeTable};

/// Batches produced by one collection cycle.
#[derive(Debug, Clone)]
pub struct CycleBatches {
    /// Cycle identifier.
    pub cycle_id: CycleId,
    /// Cycle timestamp stamped on every record.
    pub cycle_at: Timestamp,
    /// API records.
    pub api: RateBatch,
    /// Scrape records.
    pub scrape: RateBatch,
    /// Fetches that failed during the cycle.
    pub failures: Vec<SourceFailure>,
}

impl CycleBatches {
    /// Failures attributed to `source`.
    pub fn failures_for(&self, source: RateSource) -> impl Iterator<Item = &SourceFailure> {
        self.failures.iter().filter(move |f| f.source == source)
    }
}

/// Runs both source clients for a cycle.
pub struct Collector {
    api: ApiRateClient,
    scrape: KioskScrapeClient,
}

impl Collector {
    /// Create a collector over the two source clients.
    pub fn new(api: ApiRateClient, scrape: KioskScrapeClient) -> Self {
        Self { api, scrape }
    }

    /// Run one collection cycle.
    ///
    /// Source failures never fail the cycle; they are reported in
    /// [`CycleBatches::failures`] next to whatever the other fetches produced.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleBatches {
        let cycle_id = CycleId::new();
        let cycle_at = cycle_timestamp();

        info!(cycle_id = %cycle_id, cycle_at = %cycle_at, "Starting collection cycle");

        let (usd, eur, kiosk) = tokio::join!(
            self.api.try_fetch(BaseCurrency::Usd),
            self.api.try_fetch(BaseCurrency::Eur),
            self.scrape.try_fetch(),
        );

        let mut failures = Vec::new();

        let usd = usd.unwrap_or_else(|e| {
            warn!(error = %e, "USD-base fetch failed");
            failures.push(SourceFailure::new(RateSource::Api, "USD", e));
            RateTable::new()
        });
        let eur = eur.unwrap_or_else(|e| {
            warn!(error = %e, "EUR-base fetch failed, euro rates left empty");
            failures.push(SourceFailure::new(RateSource::Api, "EUR", e));
            RateTable::new()
        });
        let kiosk = kiosk.unwrap_or_else(|e| {
            warn!(error = %e, "Kiosk scrape failed");
            failures.push(SourceFailure::new(RateSource::Scrape, "kiosk", e));
            ScrapeTable::new()
        });

        let api = api_batch(cycle_id, cycle_at, &usd, &eur);
        let scrape = scrape_batch(cycle_id, cycle_at, &kiosk);

        info!(
            cycle_id = %cycle_id,
            api_records = api.len(),
            scrape_records = scrape.len(),
            failures = failures.len(),
            "Collection cycle finished"
        );

        CycleBatches {
            cycle_id,
            cycle_at,
            api,
            scrape,
            failures,
        }
    }
}

/// Join the USD-base and EUR-base tables on the USD-base codes.
pub fn api_batch(cycle_id: CycleId, cycle_at: Timestamp, usd: &RateTable, eur: &RateTable) -> RateBatch {
    let mut batch = RateBatch::new(RateSource::Api, cycle_id, cycle_at);
    for (code, usd_rate) in usd {
        let record = RateRecord::api(code.clone(), *usd_rate, eur.get(code).copied(), cycle_at);
        if let Err(e) = batch.push(record) {
            warn!(code = %code, error = %e, "Dropping API record");
        }
    }
    batch
}

/// One scrape record per accepted kiosk row.
pub fn scrape_batch(cycle_id: CycleId, cycle_at: Timestamp, kiosk: &ScrapeTable) -> RateBatch {
    let mut batch = RateBatch::new(RateSource::Scrape, cycle_id, cycle_at);
    for (code, quote) in kiosk {
        let Some(record) = RateRecord::scrape(code.clone(), quote.buy_aed, quote.sell_aed, cycle_at) else {
            warn!(code = %code, "Dropping scrape record with invalid values");
            continue;
        };
        if let Err(e) = batch.push(record) {
            warn!(code = %code, error = %e, "Dropping scrape record");
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use ratekeeper_common::{CurrencyCode, ErrorKind, RateValues};

    use crate::api::ApiClientConfig;
    use crate::browser::HttpBrowser;
    use crate::http::{CannedResponse, StaticFetcher};
    use crate::scrape::ScrapeClientConfig;

    const USD_URL: &str = "http://rates.test/USD";
    const EUR_URL: &str = "http://rates.test/EUR";
    const KIOSK_URL: &str = "http://kiosk.test/rates";

    const KIOSK_PAGE: &str = r#"<ul>
        <li><div class="currency">USD - US Dollar</div><div class="fc_buy">3.6700</div><div class="fc_cell">3.6730</div></li>
        <li><div class="currency">GBP - British Pound</div><div class="fc_buy">4.6500</div><div class="fc_cell">4.7000</div></li>
    </ul>"#;

    fn collector(fetcher: Arc<StaticFetcher>) -> Collector {
        let api = ApiRateClient::new(
            fetcher.clone(),
            ApiClientConfig {
                usd_url: USD_URL.to_string(),
                eur_url: EUR_URL.to_string(),
                timeout: Duration::from_secs(1),
            },
        );
        let browser = HttpBrowser::new(fetcher).with_poll_interval(Duration::from_millis(10));
        let scrape = KioskScrapeClient::new(
            Arc::new(browser),
            ScrapeClientConfig {
                url: KIOSK_URL.to_string(),
                wait_timeout: Duration::from_millis(100),
                ..Default::default()
            },
        );
        Collector::new(api, scrape)
    }

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_cycle_builds_both_batches() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with_ok(USD_URL, r#"{"rates":{"AED":3.6725,"EUR":0.92,"USD":1}}"#)
                .with_ok(EUR_URL, r#"{"rates":{"AED":3.99,"USD":1.087}}"#)
                .with_ok(KIOSK_URL, KIOSK_PAGE),
        );
        let batches = collector(fetcher).run_cycle().await;

        assert!(batches.failures.is_empty());
        assert_eq!(batches.api.len(), 3);
        assert_eq!(batches.scrape.len(), 2);

        let codes: Vec<&str> = batches.api.records().iter().map(|r| r.currency_code.as_str()).collect();
        assert_eq!(codes, vec!["AED", "EUR", "USD"]);

        let aed = &batches.api.records()[0];
        assert_eq!(
            aed.values,
            RateValues::Api {
                usd_to_currency: 3.6725,
                euro_to_currency: Some(3.99),
            }
        );
        // EUR is not in the EUR-base table
        assert_eq!(
            batches.api.records()[1].values,
            RateValues::Api {
                usd_to_currency: 0.92,
                euro_to_currency: None,
            }
        );

        for record in batches.api.records().iter().chain(batches.scrape.records()) {
            assert_eq!(record.observed_at, batches.cycle_at);
        }
        assert_eq!(batches.api.cycle_id, batches.cycle_id);
        assert_eq!(batches.scrape.cycle_id, batches.cycle_id);
    }

    #[tokio::test]
    async fn test_eur_failure_keeps_usd_batch() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with_ok(USD_URL, r#"{"rates":{"AED":3.6725,"GBP":0.79}}"#)
                .with_ok(KIOSK_URL, KIOSK_PAGE),
        );
        fetcher.set(EUR_URL, CannedResponse::Hang);

        let batches = collector(fetcher).run_cycle().await;

        assert_eq!(batches.api.len(), 2);
        assert!(batches.api.records().iter().all(|r| matches!(
            r.values,
            RateValues::Api {
                euro_to_currency: None,
                ..
            }
        )));
        let failures: Vec<_> = batches.failures_for(RateSource::Api).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].fetch, "EUR");
        assert_eq!(failures[0].report.kind, ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_sources_fail_independently() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with_ok(EUR_URL, r#"{"rates":{"AED":3.99}}"#)
                .with_ok(KIOSK_URL, KIOSK_PAGE),
        );
        fetcher.set(USD_URL, CannedResponse::Refuse);

        let batches = collector(fetcher.clone()).run_cycle().await;

        assert!(batches.api.is_empty());
        assert_eq!(batches.scrape.len(), 2);
        assert_eq!(batches.failures_for(RateSource::Scrape).count(), 0);
        assert_eq!(fetcher.hits(USD_URL), 1);
    }

    #[tokio::test]
    async fn test_kiosk_failure_is_attributed_to_scrape() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with_ok(USD_URL, r#"{"rates":{"AED":3.6725}}"#)
                .with_ok(EUR_URL, r#"{"rates":{"AED":3.99}}"#),
        );

        let batches = collector(fetcher).run_cycle().await;

        assert_eq!(batches.api.len(), 1);
        assert!(batches.scrape.is_empty());
        let failures: Vec<_> = batches.failures_for(RateSource::Scrape).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].fetch, "kiosk");
    }

    #[test]
    fn test_api_batch_joins_on_usd_codes() {
        let at = cycle_timestamp();
        let usd: RateTable = [(code("AED"), 3.67)].into_iter().collect();
        let eur: RateTable = [(code("AED"), 4.0), (code("JPY"), 160.0)].into_iter().collect();

        let batch = api_batch(CycleId::new(), at, &usd, &eur);

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records()[0].currency_code, code("AED"));
    }
}
