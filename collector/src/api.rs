//! Client for the bulk JSON rate-table API.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ratekeeper_common::{constants, BaseCurrency, CurrencyCode, DurationExt};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{CollectError, CollectResult};
use crate::http::HttpFetcher;

/// Rates keyed by target currency, in units of target per one unit of base.
pub type RateTable = BTreeMap<CurrencyCode, f64>;

/// Configuration for the API client.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Endpoint serving the USD-base table.
    pub usd_url: String,
    /// Endpoint serving the EUR-base table.
    pub eur_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            usd_url: "https://open.er-api.com/v6/latest/USD".to_string(),
            eur_url: "https://open.er-api.com/v6/latest/EUR".to_string(),
            timeout: constants::api_request_timeout().as_std(),
        }
    }
}

impl ApiClientConfig {
    /// Endpoint for a base currency.
    pub fn url_for(&self, base: BaseCurrency) -> &str {
        match base {
            BaseCurrency::Usd => &self.usd_url,
            BaseCurrency::Eur => &self.eur_url,
        }
    }
}

/// Shape of the rate API body.
#[derive(Debug, Deserialize)]
struct RatesPayload {
    /// `"success"` or `"error"` on providers that report it.
    #[serde(default)]
    result: Option<String>,
    #[serde(default, rename = "error-type")]
    error_type: Option<String>,
    #[serde(default)]
    rates: Option<BTreeMap<String, serde_json::Value>>,
}

/// Fetches base-currency rate tables.
pub struct ApiRateClient {
    http: Arc<dyn HttpFetcher>,
    config: ApiClientConfig,
}

impl ApiRateClient {
    /// Create a new API client.
    pub fn new(http: Arc<dyn HttpFetcher>, config: ApiClientConfig) -> Self {
        Self { http, config }
    }

    /// Client configuration.
    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// Fetch the table for `base`, degrading to an empty table on failure.
    pub async fn fetch(&self, base: BaseCurrency) -> RateTable {
        match self.try_fetch(base).await {
            Ok(table) => table,
            Err(e) => {
                warn!(base = %base, error = %e, kind = %e.kind(), "Rate API fetch failed");
                RateTable::new()
            }
        }
    }

    /// Fetch the table for `base`.
    #[instrument(skip(self), fields(base = %base))]
    pub async fn try_fetch(&self, base: BaseCurrency) -> CollectResult<RateTable> {
        let url = self.config.url_for(base);
        let response = self
            .http
            .get(url, self.config.timeout)
            .await?
            .error_for_status(url)?;

        let table = parse_rates(url, &response.body)?;

        info!(base = %base, count = table.len(), "Fetched rate table");
        Ok(table)
    }
}

/// Parse a rate API body into a table.
///
/// Entries with a malformed code or a non-numeric value are skipped one by
/// one; a body without a `rates` object fails as a whole. When several keys
/// normalize to the same code, the key already in uppercase wins, otherwise
/// the first key in sorted order.
pub fn parse_rates(origin: &str, body: &str) -> CollectResult<RateTable> {
    let payload: RatesPayload = serde_json::from_str(body)
        .map_err(|e| CollectError::parse(origin, format!("invalid JSON: {}", e)))?;

    if payload.result.as_deref() == Some("error") {
        let reason = payload.error_type.unwrap_or_else(|| "unspecified".to_string());
        return Err(CollectError::parse(origin, format!("provider reported error: {}", reason)));
    }

    let rates = payload
        .rates
        .ok_or_else(|| CollectError::parse(origin, "missing `rates` object"))?;

    let mut table = RateTable::new();
    let mut skipped = 0usize;

    for (raw_code, raw_rate) in rates {
        let Ok(code) = CurrencyCode::parse(&raw_code) else {
            debug!(code = %raw_code, "Skipping malformed currency code");
            skipped += 1;
            continue;
        };
        let Some(rate) = raw_rate.as_f64().filter(|r| r.is_finite()) else {
            debug!(code = %code, value = %raw_rate, "Skipping non-numeric rate");
            skipped += 1;
            continue;
        };
        let exact = raw_code == code.as_str();
        match table.get(&code) {
            Some(kept) if !exact => {
                debug!(code = %code, key = %raw_code, kept, "Ignoring duplicate rate key");
            }
            _ => {
                table.insert(code, rate);
            }
        }
    }

    if skipped > 0 {
        warn!(origin, skipped, "Skipped unusable rate entries");
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{CannedResponse, StaticFetcher};
    use ratekeeper_common::ErrorKind;

    const USD_URL: &str = "http://rates.test/USD";
    const EUR_URL: &str = "http://rates.test/EUR";

    fn config() -> ApiClientConfig {
        ApiClientConfig {
            usd_url: USD_URL.to_string(),
            eur_url: EUR_URL.to_string(),
            timeout: Duration::from_secs(1),
        }
    }

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_parses_rates() {
        let fetcher = StaticFetcher::new().with_ok(
            USD_URL,
            r#"{"result":"success","base_code":"USD","rates":{"AED":3.67,"GBP":0.79}}"#,
        );
        let client = ApiRateClient::new(Arc::new(fetcher), config());

        let table = client.try_fetch(BaseCurrency::Usd).await.unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table[&code("AED")], 3.67);
        assert_eq!(table[&code("GBP")], 0.79);
    }

    #[tokio::test]
    async fn test_fetch_uses_endpoint_for_base() {
        let fetcher = Arc::new(StaticFetcher::new().with_ok(EUR_URL, r#"{"rates":{"AED":4.0}}"#));
        let client = ApiRateClient::new(fetcher.clone(), config());

        let table = client.try_fetch(BaseCurrency::Eur).await.unwrap();

        assert_eq!(table[&code("AED")], 4.0);
        assert_eq!(fetcher.hits(EUR_URL), 1);
        assert_eq!(fetcher.hits(USD_URL), 0);
    }

    #[tokio::test]
    async fn test_non_success_status_is_network_error() {
        let fetcher = StaticFetcher::new();
        fetcher.set(
            USD_URL,
            CannedResponse::Respond {
                status: 500,
                body: "oops".to_string(),
            },
        );
        let client = ApiRateClient::new(Arc::new(fetcher), config());

        let err = client.try_fetch(BaseCurrency::Usd).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_empty_table() {
        let fetcher = StaticFetcher::new();
        fetcher.set(USD_URL, CannedResponse::Hang);
        let client = ApiRateClient::new(Arc::new(fetcher), config());

        assert!(client.fetch(BaseCurrency::Usd).await.is_empty());
    }

    #[test]
    fn test_parse_missing_rates_is_parse_error() {
        let err = parse_rates(USD_URL, r#"{"base":"USD"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_parse_malformed_json_is_parse_error() {
        let err = parse_rates(USD_URL, "<html>maintenance</html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_parse_provider_error_result() {
        let err = parse_rates(USD_URL, r#"{"result":"error","error-type":"unsupported-code"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("unsupported-code"));
    }

    #[test]
    fn test_parse_skips_bad_entries_and_normalizes_codes() {
        let table = parse_rates(
            USD_URL,
            r#"{"rates":{"aed":3.67,"BAD1":1.0,"GBP":"n/a","JPY":151}}"#,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table[&code("AED")], 3.67);
        assert_eq!(table[&code("JPY")], 151.0);
    }

    #[test]
    fn test_parse_keys_differing_in_case_resolve_to_uppercase_key() {
        let table = parse_rates(USD_URL, r#"{"rates":{"aed":1.0,"AED":3.67,"Aed":2.0}}"#).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[&code("AED")], 3.67);

        let table = parse_rates(USD_URL, r#"{"rates":{"gbp":0.5,"Gbp":0.79}}"#).unwrap();
        assert_eq!(table[&code("GBP")], 0.79);
    }
}
