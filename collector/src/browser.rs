//! Headless browser capability.
//!
//! The scrape client only talks to the traits in this module. [`HttpBrowser`]
//! is the bundled driver: it loads pages over an [`HttpFetcher`] and evaluates
//! CSS selectors with `scraper`. A driver for a real browser engine plugs in
//! behind the same traits.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use scraper::{Html, Selector};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{CollectError, CollectResult};
use crate::http::HttpFetcher;

/// When navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The `load` event fired.
    Load,
    /// The DOM was parsed.
    DomContentLoaded,
    /// No network activity for a short while.
    NetworkIdle,
}

/// Options for launching a browser session.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run without a visible window.
    pub headless: bool,
    /// Launch timeout.
    pub timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a new session.
    async fn launch(&self, options: &LaunchOptions) -> CollectResult<Box<dyn BrowserSession>>;
}

/// A running browser.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Open a new page.
    async fn new_page(&self) -> CollectResult<Box<dyn BrowserPage>>;

    /// Shut the browser down. Pages opened from it become unusable.
    async fn close(&self) -> CollectResult<()>;
}

/// One browser tab.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate to `url`.
    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> CollectResult<()>;

    /// Wait until `selector` matches at least one element.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> CollectResult<()>;

    /// All elements matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> CollectResult<Vec<Box<dyn ElementHandle>>>;

    /// Close the page.
    async fn close(&self) -> CollectResult<()>;
}

/// Handle to an element of a page.
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// First descendant matching `selector`.
    async fn query_selector(&self, selector: &str) -> CollectResult<Option<Box<dyn ElementHandle>>>;

    /// Text content of the element and its descendants.
    async fn text_content(&self) -> CollectResult<Option<String>>;
}

/// Counters of opened and released browser resources.
#[derive(Debug, Default)]
pub struct BrowserStats {
    pub sessions_opened: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
}

impl BrowserStats {
    /// Sessions not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst) - self.sessions_closed.load(Ordering::SeqCst)
    }

    /// Pages not yet closed.
    pub fn open_pages(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst) - self.pages_closed.load(Ordering::SeqCst)
    }
}

/// Headless driver that renders pages as served, without running scripts.
pub struct HttpBrowser {
    http: Arc<dyn HttpFetcher>,
    poll_interval: Duration,
    stats: Arc<BrowserStats>,
}

impl HttpBrowser {
    /// Create a driver on top of an HTTP fetcher.
    pub fn new(http: Arc<dyn HttpFetcher>) -> Self {
        Self {
            http,
            poll_interval: Duration::from_secs(2),
            stats: Arc::new(BrowserStats::default()),
        }
    }

    /// Set how often `wait_for_selector` reloads the page.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Resource counters shared by every session of this driver.
    pub fn stats(&self) -> Arc<BrowserStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl BrowserLauncher for HttpBrowser {
    async fn launch(&self, options: &LaunchOptions) -> CollectResult<Box<dyn BrowserSession>> {
        if !options.headless {
            warn!("HttpBrowser has no window; launching headless");
        }
        self.stats.sessions_opened.fetch_add(1, Ordering::SeqCst);
        debug!("Browser session launched");

        Ok(Box::new(HttpSession {
            http: self.http.clone(),
            poll_interval: self.poll_interval,
            stats: self.stats.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct HttpSession {
    http: Arc<dyn HttpFetcher>,
    poll_interval: Duration,
    stats: Arc<BrowserStats>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn new_page(&self) -> CollectResult<Box<dyn BrowserPage>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CollectError::Browser("session is closed".to_string()));
        }
        self.stats.pages_opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(HttpPage {
            http: self.http.clone(),
            poll_interval: self.poll_interval,
            stats: self.stats.clone(),
            session_closed: self.closed.clone(),
            closed: AtomicBool::new(false),
            document: RwLock::new(None),
        }))
    }

    async fn close(&self) -> CollectResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.stats.sessions_closed.fetch_add(1, Ordering::SeqCst);
            debug!("Browser session closed");
        }
        Ok(())
    }
}

/// Last document loaded into a page.
#[derive(Debug, Clone)]
struct LoadedDocument {
    url: String,
    html: String,
}

struct HttpPage {
    http: Arc<dyn HttpFetcher>,
    poll_interval: Duration,
    stats: Arc<BrowserStats>,
    session_closed: Arc<AtomicBool>,
    closed: AtomicBool,
    document: RwLock<Option<LoadedDocument>>,
}

impl HttpPage {
    fn ensure_open(&self) -> CollectResult<()> {
        if self.closed.load(Ordering::SeqCst) || self.session_closed.load(Ordering::SeqCst) {
            return Err(CollectError::Browser("page is closed".to_string()));
        }
        Ok(())
    }

    fn current(&self) -> CollectResult<LoadedDocument> {
        self.document
            .read()
            .clone()
            .ok_or_else(|| CollectError::Browser("page has no document; call goto first".to_string()))
    }

    async fn load(&self, url: &str, timeout: Duration) -> CollectResult<()> {
        let response = self.http.get(url, timeout).await?.error_for_status(url)?;
        *self.document.write() = Some(LoadedDocument {
            url: url.to_string(),
            html: response.body,
        });
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for HttpPage {
    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> CollectResult<()> {
        self.ensure_open()?;
        debug!(url, ?wait_until, "Navigating");
        self.load(url, timeout).await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> CollectResult<()> {
        self.ensure_open()?;
        let deadline = Instant::now() + timeout;

        loop {
            let document = self.current()?;
            if count_matches(&document.html, selector)? > 0 {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(CollectError::timeout(
                    format!("waiting for selector `{}`", selector),
                    timeout,
                ));
            }

            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
            self.ensure_open()?;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                continue;
            }
            if let Err(e) = self.load(&document.url, remaining).await {
                debug!(url = %document.url, error = %e, "Reload while waiting failed");
            }
        }
    }

    async fn query_all(&self, selector: &str) -> CollectResult<Vec<Box<dyn ElementHandle>>> {
        self.ensure_open()?;
        let document = self.current()?;

        let elements = select_all(&document.html, selector)?
            .into_iter()
            .map(|html| Box::new(FragmentElement { html }) as Box<dyn ElementHandle>)
            .collect();
        Ok(elements)
    }

    async fn close(&self) -> CollectResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.stats.pages_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Element detached from its page as an HTML fragment.
struct FragmentElement {
    html: String,
}

#[async_trait]
impl ElementHandle for FragmentElement {
    async fn query_selector(&self, selector: &str) -> CollectResult<Option<Box<dyn ElementHandle>>> {
        let first = select_first_in_fragment(&self.html, selector)?;
        Ok(first.map(|html| Box::new(FragmentElement { html }) as Box<dyn ElementHandle>))
    }

    async fn text_content(&self) -> CollectResult<Option<String>> {
        let fragment = Html::parse_fragment(&self.html);
        let text: String = fragment.root_element().text().collect();
        Ok(Some(text))
    }
}

// Parsed documents are not `Send`, so every use stays inside one synchronous
// call and only owned strings cross an `.await`.

fn parse_selector(selector: &str) -> CollectResult<Selector> {
    Selector::parse(selector)
        .map_err(|_| CollectError::parse("selector", format!("invalid CSS selector `{}`", selector)))
}

fn count_matches(html: &str, selector: &str) -> CollectResult<usize> {
    let selector = parse_selector(selector)?;
    Ok(Html::parse_document(html).select(&selector).count())
}

fn select_all(html: &str, selector: &str) -> CollectResult<Vec<String>> {
    let selector = parse_selector(selector)?;
    Ok(Html::parse_document(html)
        .select(&selector)
        .map(|element| element.html())
        .collect())
}

fn select_first_in_fragment(html: &str, selector: &str) -> CollectResult<Option<String>> {
    let selector = parse_selector(selector)?;
    Ok(Html::parse_fragment(html)
        .select(&selector)
        .next()
        .map(|element| element.html()))
}
