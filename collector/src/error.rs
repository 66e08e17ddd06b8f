//! Collector error types.

use ratekeeper_common::{ErrorKind, FailureReport, RateError, RateSource};
use thiserror::Error;

/// Errors that can occur while fetching from a rate source.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Connection refused, DNS failure, reset connection.
    #[error("Request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    /// A bounded step ran out of time.
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    /// Source answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Payload is not what the source is supposed to return.
    #[error("Malformed payload from {origin}: {reason}")]
    Parse { origin: String, reason: String },

    /// Browser launch, navigation or page handling failed.
    #[error("Browser error: {0}")]
    Browser(String),
}

impl CollectError {
    /// Build a parse error.
    pub fn parse(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        CollectError::Parse {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Build a timeout error.
    pub fn timeout(operation: impl Into<String>, after: std::time::Duration) -> Self {
        CollectError::Timeout {
            operation: operation.into(),
            seconds: after.as_secs(),
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollectError::Parse { .. } => ErrorKind::Parse,
            _ => ErrorKind::Network,
        }
    }

    /// Classify a reqwest failure for `url`.
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            CollectError::timeout(format!("GET {}", url), timeout)
        } else if let Some(status) = err.status() {
            CollectError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }
        } else {
            CollectError::Network {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

impl From<CollectError> for RateError {
    fn from(err: CollectError) -> Self {
        match err {
            CollectError::Network { url, reason } => {
                RateError::Network(format!("{}: {}", url, reason))
            }
            CollectError::Timeout { operation, seconds } => {
                RateError::Timeout(format!("{} after {}s", operation, seconds))
            }
            CollectError::HttpStatus { status, url } => RateError::HttpStatus { status, url },
            CollectError::Parse { origin, reason } => {
                RateError::Parse(format!("{}: {}", origin, reason))
            }
            CollectError::Browser(reason) => RateError::Browser(reason),
        }
    }
}

/// Result type for collector operations.
pub type CollectResult<T> = Result<T, CollectError>;

/// A failure attributed to one source fetch within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Source that failed.
    pub source: RateSource,
    /// Which fetch of the source failed (e.g. `USD`, `EUR`, `kiosk`).
    pub fetch: String,
    /// Classified failure.
    pub report: FailureReport,
}

impl SourceFailure {
    /// Record a failed fetch.
    pub fn new(source: RateSource, fetch: impl Into<String>, err: CollectError) -> Self {
        let err = RateError::from(err);
        Self {
            source,
            fetch: fetch.into(),
            report: FailureReport::from(&err),
        }
    }
}
