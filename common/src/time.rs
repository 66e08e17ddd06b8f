//! Time utilities and constants for ratekeeper.

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Pipeline timing constants.
pub mod constants {
    use super::Duration;

    /// Per-request timeout for the rate API (10 seconds).
    pub fn api_request_timeout() -> Duration {
        Duration::seconds(10)
    }

    /// Browser launch timeout (60 seconds).
    pub fn browser_launch_timeout() -> Duration {
        Duration::seconds(60)
    }

    /// Page navigation timeout (60 seconds).
    pub fn navigation_timeout() -> Duration {
        Duration::seconds(60)
    }

    /// Default wait for the kiosk rate table to render (30 seconds).
    pub fn scrape_wait_default() -> Duration {
        Duration::seconds(30)
    }

    /// Hard ceiling on the rate table wait (10 minutes).
    pub fn scrape_wait_ceiling() -> Duration {
        Duration::minutes(10)
    }

    /// Interval between scheduled ingestion cycles (24 hours).
    pub fn ingest_interval() -> Duration {
        Duration::hours(24)
    }

    /// Upper bound on one ingestion cycle before it is abandoned (15 minutes).
    pub fn cycle_timeout() -> Duration {
        Duration::minutes(15)
    }
}

/// A timestamp with timezone (always UTC for ratekeeper).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Timestamp for a new ingestion cycle, truncated to whole seconds.
///
/// Every record of the cycle carries this value as `observed_at`.
pub fn cycle_timestamp() -> Timestamp {
    now().trunc_subsecs(0)
}

/// Age of a timestamp relative to now. Never negative.
pub fn age(timestamp: Timestamp) -> Duration {
    let age = now() - timestamp;
    if age < Duration::zero() {
        Duration::zero()
    } else {
        age
    }
}

/// Check if a timestamp is older than `max_age`.
pub fn is_older_than(timestamp: Timestamp, max_age: Duration) -> bool {
    age(timestamp) > max_age
}

/// Calculate expiry time from now.
pub fn expires_in(duration: Duration) -> Timestamp {
    now() + duration
}

/// Duration extensions for convenient construction.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

/// Deadline shared by the steps of one bounded operation.
#[derive(Debug, Clone)]
pub struct Timeout {
    /// Deadline for the operation.
    pub deadline: Timestamp,
    /// Operation description.
    pub operation: String,
}

impl Timeout {
    /// Create a new timeout.
    pub fn new(duration: Duration, operation: impl Into<String>) -> Self {
        Self {
            deadline: expires_in(duration),
            operation: operation.into(),
        }
    }

    /// Get remaining duration.
    pub fn remaining(&self) -> Duration {
        let remaining = self.deadline - now();
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }

    /// Get remaining as std::time::Duration.
    pub fn remaining_std(&self) -> std::time::Duration {
        self.remaining().as_std()
    }
}
