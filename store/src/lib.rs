//! Ratekeeper Store
//!
//! Reconciling latest-value store for normalized rate batches: one row per
//! `(source, currency code)`, rewritten only when the values change.

pub mod error;
pub mod memory;
pub mod repository;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryRateStore;
pub use repository::{RateStore, UpsertAction, UpsertSummary};
pub use sqlite::{SqliteRateStore, IN_MEMORY};
