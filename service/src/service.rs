//! Rate service facade: lookups for the front end and serialized ingestion.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use ratekeeper_collector::{ApiRateClient, Collector, HttpBrowser, KioskScrapeClient, ReqwestFetcher};
use ratekeeper_common::{is_older_than, CurrencyCode, RateError, RateRecord, RateSource};
use ratekeeper_store::{RateStore, SqliteRateStore};

use crate::config::ServiceConfig;
use crate::job::IngestionJob;
use crate::metrics::{Metrics, SharedMetrics};
use crate::outcome::IngestionOutcome;
use crate::reporter::OutcomeReporter;
use crate::state::ServiceState;

/// Answer to a rate lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateQuote {
    /// Latest stored record.
    pub record: RateRecord,
    /// Record is older than the configured maximum age.
    pub stale: bool,
}

/// Entry point for lookups and ingestion cycles.
pub struct RateService {
    job: IngestionJob,
    store: Arc<dyn RateStore>,
    max_age: Option<chrono::Duration>,
    cycle_lock: Mutex<()>,
    state: RwLock<ServiceState>,
    metrics: SharedMetrics,
}

impl RateService {
    /// Create a service over a job. Lookups read the job's store.
    pub fn new(job: IngestionJob, max_age: Option<Duration>) -> Self {
        let store = job.store().clone();
        Self {
            job,
            store,
            max_age: max_age.and_then(|d| chrono::Duration::from_std(d).ok()),
            cycle_lock: Mutex::new(()),
            state: RwLock::new(ServiceState::Starting),
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Wire the production components described by `config`.
    pub async fn from_config(config: &ServiceConfig, reporter: Arc<dyn OutcomeReporter>) -> Result<Self, RateError> {
        let http = Arc::new(ReqwestFetcher::new()?);
        let api = ApiRateClient::new(http.clone(), config.api_client());
        let scrape = KioskScrapeClient::new(Arc::new(HttpBrowser::new(http)), config.scrape_client());

        let store = SqliteRateStore::connect(&config.store_path).await?;
        let api_rows = store.count(RateSource::Api).await?;
        let scrape_rows = store.count(RateSource::Scrape).await?;
        info!(path = %config.store_path, api_rows, scrape_rows, "Rate store ready");

        let job = IngestionJob::new(Collector::new(api, scrape), Arc::new(store), reporter);
        Ok(Self::new(job, config.rate_max_age))
    }

    /// Mark the service as running.
    pub fn start(&self) {
        *self.state.write() = ServiceState::Running;
        info!("Rate service running");
    }

    /// Stop the service, waiting for an in-flight cycle to finish.
    pub async fn stop(&self) {
        *self.state.write() = ServiceState::ShuttingDown;
        let _cycle = self.cycle_lock.lock().await;
        *self.state.write() = ServiceState::Stopped;
        info!("Rate service stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    /// Service metrics.
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Latest stored rate for a currency code.
    ///
    /// The code is normalized first; a malformed code is reported as absent.
    /// Only storage failures are errors.
    #[instrument(skip(self))]
    pub async fn fetch_rates(&self, source: RateSource, code: &str) -> Result<Option<RateQuote>, RateError> {
        let code = match CurrencyCode::parse(code) {
            Ok(code) => code,
            Err(e) => {
                debug!(error = %e, "Malformed currency code");
                self.metrics.lookup(false);
                return Ok(None);
            }
        };

        let record = self.store.lookup(source, &code).await?;
        self.metrics.lookup(record.is_some());

        Ok(record.map(|record| {
            let stale = self
                .max_age
                .map(|max_age| is_older_than(record.observed_at, max_age))
                .unwrap_or(false);
            RateQuote { record, stale }
        }))
    }

    /// Run one ingestion cycle. Overlapping calls run one after another.
    pub async fn run_ingestion_cycle(&self) -> IngestionOutcome {
        let _cycle = self.cycle_lock.lock().await;
        let outcome = self.job.run().await;
        self.metrics.cycle_completed(&outcome);
        outcome
    }
}
