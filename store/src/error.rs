//! Store error types.

use ratekeeper_common::{ErrorKind, RateError, RateSource};
use thiserror::Error;

/// Errors raised by a rate store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Statement or connection failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row could not be read back.
    #[error("Corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    /// Batch and record sources disagree.
    #[error("Record for {record} in a {batch} batch")]
    SourceMismatch { batch: RateSource, record: RateSource },

    /// Store location could not be prepared.
    #[error("Store location error: {0}")]
    Location(String),
}

impl StoreError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Persistence
    }
}

impl From<StoreError> for RateError {
    fn from(err: StoreError) -> Self {
        RateError::Persistence(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
