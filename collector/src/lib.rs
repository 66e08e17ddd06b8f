//! Ratekeeper Collector
//!
//! Source clients for the two rate feeds and the orchestrator that runs
//! them together once per ingestion cycle.
//!
//! # Features
//!
//! - JSON rate-table client for the USD-base and EUR-base endpoints
//! - Kiosk page scraper behind a pluggable headless-browser capability
//! - Concurrent collection with per-source failure attribution
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ratekeeper_collector::{ApiRateClient, Collector, HttpBrowser, KioskScrapeClient, ReqwestFetcher};
//!
//! let http = Arc::new(ReqwestFetcher::new()?);
//! let api = ApiRateClient::new(http.clone(), Default::default());
//! let scrape = KioskScrapeClient::new(Arc::new(HttpBrowser::new(http)), Default::default());
//!
//! let batches = Collector::new(api, scrape).run_cycle().await;
//! ```

pub mod api;
pub mod browser;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod scrape;

pub use api::{parse_rates, ApiClientConfig, ApiRateClient, RateTable};
pub use browser::{
    BrowserLauncher, BrowserPage, BrowserSession, BrowserStats, ElementHandle, HttpBrowser, LaunchOptions,
    WaitUntil,
};
pub use error::{CollectError, CollectResult, SourceFailure};
pub use http::{HttpFetcher, HttpResponse, ReqwestFetcher};
pub use orchestrator::{Collector, CycleBatches};
pub use scrape::{KioskScrapeClient, ScrapeClientConfig, ScrapeQuote, ScrapeSelectors, ScrapeTable};

#[cfg(any(test, feature = "test-utils"))]
pub use http::{CannedResponse, StaticFetcher};
