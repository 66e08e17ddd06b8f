//! Exchange-kiosk page scraper.
//!
//! The kiosk publishes one list row per currency with a label, a buy cell
//! and a sell cell, all in AED per unit of the foreign currency. The store
//! keeps the API orientation (units of currency per 1 AED), so both values
//! are inverted here.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ratekeeper_common::{constants, CurrencyCode, DurationExt, Timeout};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::browser::{BrowserLauncher, BrowserPage, BrowserSession, ElementHandle, LaunchOptions, WaitUntil};
use crate::error::{CollectError, CollectResult};

/// Buy/sell pair for one currency, in units of currency per 1 AED.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrapeQuote {
    pub buy_aed: f64,
    pub sell_aed: f64,
}

/// Accepted quotes, ordered by currency code.
pub type ScrapeTable = BTreeMap<CurrencyCode, ScrapeQuote>;

/// CSS selectors describing the kiosk rate list.
#[derive(Debug, Clone)]
pub struct ScrapeSelectors {
    /// Present once the rate list has rendered.
    pub ready: String,
    /// One element per currency row.
    pub row: String,
    /// Currency label cell within a row.
    pub label: String,
    /// Buy cell within a row.
    pub buy: String,
    /// Sell cell within a row.
    pub sell: String,
}

impl Default for ScrapeSelectors {
    fn default() -> Self {
        Self {
            ready: "ul > li div[class*='fc_buy']".to_string(),
            row: "ul > li".to_string(),
            label: "div[class*='currency']".to_string(),
            buy: "div[class*='fc_buy']".to_string(),
            sell: "div[class*='fc_cell']".to_string(),
        }
    }
}

/// Configuration for the scrape client.
#[derive(Debug, Clone)]
pub struct ScrapeClientConfig {
    /// Kiosk rate page.
    pub url: String,
    /// Browser launch options.
    pub launch: LaunchOptions,
    /// Navigation timeout.
    pub navigation_timeout: Duration,
    /// Wait for the rate list to render. Clamped to the hard ceiling.
    pub wait_timeout: Duration,
    /// Row selectors.
    pub selectors: ScrapeSelectors,
}

impl Default for ScrapeClientConfig {
    fn default() -> Self {
        Self {
            url: "https://www.sharafexchange.ae/services/currency-exchange".to_string(),
            launch: LaunchOptions {
                headless: true,
                timeout: constants::browser_launch_timeout().as_std(),
            },
            navigation_timeout: constants::navigation_timeout().as_std(),
            wait_timeout: constants::scrape_wait_default().as_std(),
            selectors: ScrapeSelectors::default(),
        }
    }
}

impl ScrapeClientConfig {
    /// Total budget for one fetch: launch, navigation and table wait.
    pub fn total_budget(&self) -> Duration {
        self.launch.timeout + self.navigation_timeout + self.effective_wait()
    }

    /// Table wait after clamping to the hard ceiling.
    pub fn effective_wait(&self) -> Duration {
        self.wait_timeout.min(constants::scrape_wait_ceiling().as_std())
    }
}

/// Why a row was left out of the table.
#[derive(Debug, Clone, PartialEq)]
pub enum RowRejection {
    /// Label, buy or sell cell missing or empty.
    MissingCell(&'static str),
    /// No currency code could be read from the label.
    BadLabel(String),
    /// Cell text is not a number.
    NotNumeric { cell: &'static str, text: String },
    /// Buy or sell is zero, negative or not finite.
    NonPositive { buy: f64, sell: f64 },
}

/// Drives a browser session over the kiosk page.
pub struct KioskScrapeClient {
    browser: Arc<dyn BrowserLauncher>,
    config: ScrapeClientConfig,
}

impl KioskScrapeClient {
    /// Create a new scrape client.
    pub fn new(browser: Arc<dyn BrowserLauncher>, config: ScrapeClientConfig) -> Self {
        Self { browser, config }
    }

    /// Client configuration.
    pub fn config(&self) -> &ScrapeClientConfig {
        &self.config
    }

    /// Scrape the page, degrading to an empty table on failure.
    pub async fn fetch(&self) -> ScrapeTable {
        match self.try_fetch().await {
            Ok(table) => table,
            Err(e) => {
                warn!(url = %self.config.url, error = %e, kind = %e.kind(), "Kiosk scrape failed");
                ScrapeTable::new()
            }
        }
    }

    /// Scrape the page.
    ///
    /// The session and the page are closed on every path out of this call.
    #[instrument(skip(self), fields(url = %self.config.url))]
    pub async fn try_fetch(&self) -> CollectResult<ScrapeTable> {
        let budget = Timeout::new(
            chrono::Duration::from_std(self.config.total_budget()).unwrap_or_else(|_| constants::scrape_wait_ceiling()),
            "kiosk scrape",
        );

        let launch_timeout = self.config.launch.timeout;
        let session = tokio::time::timeout(launch_timeout, self.browser.launch(&self.config.launch))
            .await
            .map_err(|_| CollectError::timeout("browser launch", launch_timeout))??;

        let result = self.scrape_in_session(session.as_ref(), &budget).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close browser session");
        }

        result
    }

    async fn scrape_in_session(
        &self,
        session: &dyn BrowserSession,
        budget: &Timeout,
    ) -> CollectResult<ScrapeTable> {
        let page = session.new_page().await?;

        let result = self.scrape_page(page.as_ref(), budget).await;

        if let Err(e) = page.close().await {
            warn!(error = %e, "Failed to close page");
        }

        result
    }

    async fn scrape_page(&self, page: &dyn BrowserPage, budget: &Timeout) -> CollectResult<ScrapeTable> {
        let nav_timeout = budget.remaining_std().min(self.config.navigation_timeout);
        page.goto(&self.config.url, WaitUntil::NetworkIdle, nav_timeout).await?;

        let wait_timeout = budget.remaining_std().min(self.config.effective_wait());
        page.wait_for_selector(&self.config.selectors.ready, wait_timeout)
            .await?;

        let rows = page.query_all(&self.config.selectors.row).await?;
        if rows.is_empty() {
            return Err(CollectError::parse(
                self.config.url.as_str(),
                format!("no rows match `{}`", self.config.selectors.row),
            ));
        }

        let mut table = ScrapeTable::new();
        let mut skipped = 0usize;

        for row in &rows {
            match self.read_row(row.as_ref()).await {
                Ok(Ok((code, quote))) => {
                    table.insert(code, quote);
                }
                Ok(Err(rejection)) => {
                    debug!(?rejection, "Skipping kiosk row");
                    skipped += 1;
                }
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable kiosk row");
                    skipped += 1;
                }
            }
        }

        info!(
            rows = rows.len(),
            collected = table.len(),
            skipped,
            "Collected kiosk rates"
        );
        debug!(?table, "Kiosk rate table");

        Ok(table)
    }

    /// Read one row. The outer error is a browser failure, the inner one a
    /// row that is readable but unusable.
    async fn read_row(
        &self,
        row: &dyn ElementHandle,
    ) -> CollectResult<Result<(CurrencyCode, ScrapeQuote), RowRejection>> {
        let selectors = &self.config.selectors;

        let Some(label) = cell_text(row, &selectors.label).await? else {
            return Ok(Err(RowRejection::MissingCell("label")));
        };
        let Some(buy) = cell_text(row, &selectors.buy).await? else {
            return Ok(Err(RowRejection::MissingCell("buy")));
        };
        let Some(sell) = cell_text(row, &selectors.sell).await? else {
            return Ok(Err(RowRejection::MissingCell("sell")));
        };

        Ok(parse_row(&label, &buy, &sell))
    }
}

async fn cell_text(row: &dyn ElementHandle, selector: &str) -> CollectResult<Option<String>> {
    let Some(cell) = row.query_selector(selector).await? else {
        return Ok(None);
    };
    Ok(cell
        .text_content()
        .await?
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty()))
}

/// Turn the three cell texts of a row into a quote.
pub fn parse_row(label: &str, buy: &str, sell: &str) -> Result<(CurrencyCode, ScrapeQuote), RowRejection> {
    let code = code_from_label(label).ok_or_else(|| RowRejection::BadLabel(label.to_string()))?;
    let buy = parse_cell("buy", buy)?;
    let sell = parse_cell("sell", sell)?;
    let quote = invert_quote(buy, sell).ok_or(RowRejection::NonPositive { buy, sell })?;
    Ok((code, quote))
}

/// Invert an AED-per-unit pair into units-per-AED.
///
/// Returns `None` unless both inputs are finite and strictly positive.
pub fn invert_quote(buy: f64, sell: f64) -> Option<ScrapeQuote> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(buy) || !valid(sell) {
        return None;
    }
    Some(ScrapeQuote {
        buy_aed: 1.0 / buy,
        sell_aed: 1.0 / sell,
    })
}

/// Read the currency code from a row label of the form `"<a> - <b>"`.
///
/// Candidates are the last three characters of `<a>` and of the whole label,
/// in that order. Only candidates made of ASCII letters count; an uppercase
/// one wins over the others. Labels without `" - "` have no code.
pub fn code_from_label(label: &str) -> Option<CurrencyCode> {
    let label = label.trim();
    let (head, _) = label.split_once(" - ")?;

    let candidates: Vec<&str> = [head.trim(), label]
        .into_iter()
        .filter_map(last_three)
        .filter(|tail| tail.chars().all(|c| c.is_ascii_alphabetic()))
        .collect();

    candidates
        .iter()
        .find(|tail| tail.chars().all(|c| c.is_ascii_uppercase()))
        .or_else(|| candidates.first())
        .and_then(|tail| CurrencyCode::parse(tail).ok())
}

fn last_three(s: &str) -> Option<&str> {
    let start = s.char_indices().rev().nth(2)?.0;
    Some(&s[start..])
}

fn parse_cell(cell: &'static str, text: &str) -> Result<f64, RowRejection> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().map_err(|_| RowRejection::NotNumeric {
        cell,
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::HttpBrowser;
    use crate::http::{CannedResponse, StaticFetcher};

    const PAGE: &str = "http://kiosk.test/currency-exchange";

    fn row(label: &str, buy: &str, sell: &str) -> String {
        format!(
            r#"<li><div class="flag currency">{label}</div><div class="fc_buy rate">{buy}</div><div class="fc_cell rate">{sell}</div></li>"#
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            "<html><body><h1>Rates</h1><ul class=\"rates\">{}</ul></body></html>",
            rows.concat()
        )
    }

    fn client(fetcher: StaticFetcher) -> (KioskScrapeClient, Arc<crate::browser::BrowserStats>) {
        let browser = HttpBrowser::new(Arc::new(fetcher)).with_poll_interval(Duration::from_millis(10));
        let stats = browser.stats();
        let config = ScrapeClientConfig {
            url: PAGE.to_string(),
            wait_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        (KioskScrapeClient::new(Arc::new(browser), config), stats)
    }

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_fixture_rates_are_inverted() {
        let html = page(&[row("🇺🇸USD - US Dollar", "3.6700", "3.6730")]);
        let (client, stats) = client(StaticFetcher::new().with_ok(PAGE, html));

        let table = client.try_fetch().await.unwrap();

        let quote = table[&code("USD")];
        assert!((quote.buy_aed - 1.0 / 3.6700).abs() < 1e-9);
        assert!((quote.sell_aed - 1.0 / 3.6730).abs() < 1e-9);
        assert_eq!(stats.open_sessions(), 0);
        assert_eq!(stats.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_invalid_rows_are_dropped_individually() {
        let html = page(&[
            row("GBP - British Pound", "4.6500", "4.7000"),
            row("INR - Indian Rupee", "0", "0.0450"),
            row("JPY - Japanese Yen", "0.0240", "-1"),
            row("USD - US Dollar", "3.6700", "3.6730"),
        ]);
        let (client, _) = client(StaticFetcher::new().with_ok(PAGE, html));

        let table = client.try_fetch().await.unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.contains_key(&code("GBP")));
        assert!(table.contains_key(&code("USD")));
    }

    #[tokio::test]
    async fn test_each_invalid_row_removes_exactly_one_entry() {
        let good = vec![
            row("EUR - Euro", "4.0100", "4.0500"),
            row("USD - US Dollar", "3.6700", "3.6730"),
        ];
        let mut with_bad = good.clone();
        with_bad.push(row("INR - Indian Rupee", "0", "0.0450"));

        let (baseline, _) = client(StaticFetcher::new().with_ok(PAGE, page(&good)));
        let (degraded, _) = client(StaticFetcher::new().with_ok(PAGE, page(&with_bad)));

        let expected = baseline.try_fetch().await.unwrap().len();
        assert_eq!(degraded.try_fetch().await.unwrap().len(), expected);

        with_bad.push(row("PKR - Pakistani Rupee", "0.0132", "n/a"));
        with_bad.push("<li><div class=\"currency\">CHF - Swiss Franc</div></li>".to_string());
        let (noisy, _) = client(StaticFetcher::new().with_ok(PAGE, page(&with_bad)));
        assert_eq!(noisy.try_fetch().await.unwrap().len(), expected);
    }

    #[tokio::test]
    async fn test_output_is_sorted_by_code() {
        let html = page(&[
            row("USD - US Dollar", "3.6700", "3.6730"),
            row("AUD - Australian Dollar", "2.3800", "2.4500"),
            row("GBP - British Pound", "4.6500", "4.7000"),
        ]);
        let (client, _) = client(StaticFetcher::new().with_ok(PAGE, html));

        let codes: Vec<String> = client
            .try_fetch()
            .await
            .unwrap()
            .keys()
            .map(|c| c.to_string())
            .collect();

        assert_eq!(codes, vec!["AUD", "GBP", "USD"]);
    }

    #[tokio::test]
    async fn test_missing_table_times_out_and_releases_browser() {
        let (client, stats) = client(StaticFetcher::new().with_ok(PAGE, "<p>maintenance</p>"));

        let err = client.try_fetch().await.unwrap_err();

        assert!(matches!(err, CollectError::Timeout { .. }));
        assert_eq!(stats.open_sessions(), 0);
        assert_eq!(stats.open_pages(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_page_releases_browser() {
        let fetcher = StaticFetcher::new();
        fetcher.set(PAGE, CannedResponse::Refuse);
        let (client, stats) = client(fetcher);

        assert!(client.fetch().await.is_empty());
        assert_eq!(stats.sessions_opened.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(stats.open_sessions(), 0);
        assert_eq!(stats.open_pages(), 0);
    }

    #[test]
    fn test_code_from_label() {
        assert_eq!(code_from_label("UAE Dirham - AED"), Some(code("AED")));
        assert_eq!(code_from_label("🇺🇸USD - US Dollar"), Some(code("USD")));
        assert_eq!(code_from_label("  EUR - Euro  "), Some(code("EUR")));
        assert_eq!(code_from_label("usd - US Dollar"), Some(code("USD")));
        assert_eq!(code_from_label("Usd - US Dollar"), Some(code("USD")));
        assert_eq!(code_from_label("Dollar USD"), None);
        assert_eq!(code_from_label("  EUR  "), None);
        assert_eq!(code_from_label("US - 12"), None);
    }

    #[test]
    fn test_lowercase_label_row_is_kept() {
        let (code, quote) = parse_row("usd - US Dollar", "3.6700", "3.6730").unwrap();
        assert_eq!(code.as_str(), "USD");
        assert!((quote.buy_aed - 1.0 / 3.67).abs() < 1e-9);

        assert!(matches!(
            parse_row("Dollar", "3.67", "3.673"),
            Err(RowRejection::BadLabel(_))
        ));
    }

    #[test]
    fn test_parse_row_rejections() {
        assert!(matches!(
            parse_row("USD - US Dollar", "abc", "3.67"),
            Err(RowRejection::NotNumeric { cell: "buy", .. })
        ));
        assert!(matches!(
            parse_row("USD - US Dollar", "3.67", "0"),
            Err(RowRejection::NonPositive { .. })
        ));
        assert!(matches!(parse_row("???", "3.67", "3.67"), Err(RowRejection::BadLabel(_))));
    }

    #[test]
    fn test_parse_cell_accepts_thousands_separator() {
        let (_, quote) = parse_row("IDR - Rupiah", "4,400", "4,500").unwrap();
        assert!((quote.buy_aed - 1.0 / 4400.0).abs() < 1e-12);
    }

    #[test]
    fn test_wait_is_clamped_to_ceiling() {
        let config = ScrapeClientConfig {
            wait_timeout: Duration::from_secs(3600),
            ..Default::default()
        };
        assert_eq!(config.effective_wait(), Duration::from_secs(600));
    }
}
