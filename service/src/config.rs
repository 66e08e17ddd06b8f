//! Service configuration.

use std::time::Duration;

use ratekeeper_collector::{ApiClientConfig, ScrapeClientConfig};
use ratekeeper_common::{constants, DurationExt};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" | "text" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

/// Main service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// USD-base rate table endpoint.
    pub api_usd_url: String,
    /// EUR-base rate table endpoint.
    pub api_eur_url: String,
    /// Exchange-kiosk rate page.
    pub scrape_url: String,
    /// SQLite database file, or `:memory:`.
    pub store_path: String,
    /// Per-request timeout for the rate API.
    pub api_timeout: Duration,
    /// Wait for the kiosk rate list to render.
    pub scrape_wait: Duration,
    /// Interval between ingestion cycles.
    pub ingest_interval: Duration,
    /// Upper bound on one ingestion cycle.
    pub cycle_timeout: Duration,
    /// Quotes older than this are flagged stale. Unset: never stale.
    pub rate_max_age: Option<Duration>,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let api = ApiClientConfig::default();
        let scrape = ScrapeClientConfig::default();
        Self {
            api_usd_url: api.usd_url,
            api_eur_url: api.eur_url,
            scrape_url: scrape.url,
            store_path: "data/currency_data.sqlite".to_string(),
            api_timeout: api.timeout,
            scrape_wait: scrape.wait_timeout,
            ingest_interval: constants::ingest_interval().as_std(),
            cycle_timeout: constants::cycle_timeout().as_std(),
            rate_max_age: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// unset or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let secs = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok()).map(Duration::from_secs);

        if let Some(url) = lookup("API_USD_URL") {
            config.api_usd_url = url;
        }
        if let Some(url) = lookup("API_EUR_URL") {
            config.api_eur_url = url;
        }
        if let Some(url) = lookup("SCRAPE_URL") {
            config.scrape_url = url;
        }
        if let Some(path) = lookup("STORE_PATH") {
            config.store_path = path;
        }
        if let Some(timeout) = secs("API_TIMEOUT_SECS") {
            config.api_timeout = timeout;
        }
        if let Some(wait) = secs("SCRAPE_WAIT_SECS") {
            config.scrape_wait = wait;
        }
        if let Some(interval) = secs("INGEST_INTERVAL_SECS") {
            config.ingest_interval = interval;
        }
        if let Some(timeout) = secs("CYCLE_TIMEOUT_SECS") {
            config.cycle_timeout = timeout;
        }
        if let Some(max_age) = secs("RATE_MAX_AGE_SECS") {
            config.rate_max_age = Some(max_age);
        }
        if let Some(level) = lookup("RUST_LOG") {
            config.log_level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT").as_deref().and_then(LogFormat::parse) {
            config.log_format = format;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        for (name, url) in [
            ("API_USD_URL", &self.api_usd_url),
            ("API_EUR_URL", &self.api_eur_url),
            ("SCRAPE_URL", &self.scrape_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("{} must be an http(s) URL, got `{}`", name, url));
            }
        }

        if self.store_path.trim().is_empty() {
            return Err("STORE_PATH cannot be empty".to_string());
        }

        if self.api_timeout.is_zero() {
            return Err("API timeout cannot be 0".to_string());
        }

        let ceiling = constants::scrape_wait_ceiling().as_std();
        if self.scrape_wait.is_zero() || self.scrape_wait > ceiling {
            return Err(format!(
                "Scrape wait must be between 1 and {} seconds",
                ceiling.as_secs()
            ));
        }

        if self.ingest_interval.is_zero() {
            return Err("Ingest interval cannot be 0".to_string());
        }

        if self.cycle_timeout.is_zero() {
            return Err("Cycle timeout cannot be 0".to_string());
        }

        Ok(())
    }

    /// API client settings.
    pub fn api_client(&self) -> ApiClientConfig {
        ApiClientConfig {
            usd_url: self.api_usd_url.clone(),
            eur_url: self.api_eur_url.clone(),
            timeout: self.api_timeout,
        }
    }

    /// Scrape client settings.
    pub fn scrape_client(&self) -> ScrapeClientConfig {
        ScrapeClientConfig {
            url: self.scrape_url.clone(),
            wait_timeout: self.scrape_wait,
            ..ScrapeClientConfig::default()
        }
    }
}
