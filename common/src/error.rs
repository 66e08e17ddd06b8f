//! Error types for ratekeeper.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification of every failure the pipeline can meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Timeout, connection failure, non-2xx status, browser unavailable.
    Network,
    /// Malformed JSON, missing table or selector, non-numeric cell.
    Parse,
    /// Storage statement failure.
    Persistence,
    /// Caller supplied a malformed value (e.g. a bad currency code).
    InvalidInput,
    /// Invalid start-up configuration.
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "network",
            ErrorKind::Parse => "parse",
            ErrorKind::Persistence => "persistence",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// Main error type for ratekeeper operations.
#[derive(Error, Debug)]
pub enum RateError {
    /// Connection-level failure talking to a source.
    #[error("Network error: {0}")]
    Network(String),

    /// A bounded operation ran out of time.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Source answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Source payload could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Headless browser failure (launch, navigation, page handling).
    #[error("Browser error: {0}")]
    Browser(String),

    /// Storage failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Malformed caller input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RateError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RateError::Network(_)
            | RateError::Timeout(_)
            | RateError::HttpStatus { .. }
            | RateError::Browser(_) => ErrorKind::Network,
            RateError::Parse(_) => ErrorKind::Parse,
            RateError::Persistence(_) => ErrorKind::Persistence,
            RateError::InvalidInput(_) => ErrorKind::InvalidInput,
            RateError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Check if a later cycle may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RateError::Network(_) | RateError::Timeout(_) | RateError::Browser(_) => true,
            RateError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Stable error code for logs and outcome reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            RateError::Network(_) => "NETWORK_ERROR",
            RateError::Timeout(_) => "TIMEOUT",
            RateError::HttpStatus { .. } => "HTTP_STATUS",
            RateError::Parse(_) => "PARSE_ERROR",
            RateError::Browser(_) => "BROWSER_ERROR",
            RateError::Persistence(_) => "PERSISTENCE_ERROR",
            RateError::InvalidInput(_) => "INVALID_INPUT",
            RateError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type alias for ratekeeper operations.
pub type Result<T> = std::result::Result<T, RateError>;

/// A classified failure, detached from the error value so it can be cloned
/// into outcomes and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// Failure class.
    pub kind: ErrorKind,
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl FailureReport {
    /// Create a new failure report.
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&RateError> for FailureReport {
    fn from(err: &RateError) -> Self {
        Self::new(err.kind(), err.error_code(), err.to_string())
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
