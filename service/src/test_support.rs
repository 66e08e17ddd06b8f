//! Fixtures shared by the service unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use ratekeeper_collector::{
    ApiClientConfig, ApiRateClient, Collector, HttpBrowser, KioskScrapeClient, ScrapeClientConfig, StaticFetcher,
};
use ratekeeper_common::{CurrencyCode, RateBatch, RateRecord, RateSource};
use ratekeeper_store::{MemoryRateStore, RateStore, StoreError, StoreResult, UpsertSummary};

pub const USD_URL: &str = "http://rates.test/USD";
pub const EUR_URL: &str = "http://rates.test/EUR";
pub const KIOSK_URL: &str = "http://kiosk.test/rates";

pub const KIOSK_PAGE: &str = r#"<ul>
    <li><div class="currency">USD - US Dollar</div><div class="fc_buy">3.6700</div><div class="fc_cell">3.6730</div></li>
    <li><div class="currency">GBP - British Pound</div><div class="fc_buy">4.6500</div><div class="fc_cell">4.7000</div></li>
</ul>"#;

pub fn collector(fetcher: Arc<StaticFetcher>) -> Collector {
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

/// Memory store that fails upserts for one source and can be slowed down.
pub struct FailingStore {
    inner: MemoryRateStore,
    failing: Option<RateSource>,
    delay: Duration,
}

impl FailingStore {
    pub fn new(failing: RateSource) -> Self {
        Self {
            inner: MemoryRateStore::new(),
            failing: Some(failing),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            inner: MemoryRateStore::new(),
            failing: None,
            delay,
        }
    }
}

#[async_trait]
impl RateStore for FailingStore {
    async fn upsert(&self, batch: &RateBatch) -> StoreResult<UpsertSummary> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing == Some(batch.source) {
            return Err(StoreError::Location("store unavailable".to_string()));
        }
        self.inner.upsert(batch).await
    }

    async fn lookup(&self, source: RateSource, code: &CurrencyCode) -> StoreResult<Option<RateRecord>> {
        if self.failing == Some(source) {
            return Err(StoreError::Location("store unavailable".to_string()));
        }
        self.inner.lookup(source, code).await
    }

    async fn count(&self, source: RateSource) -> StoreResult<u64> {
        self.inner.count(source).await
    }
}
