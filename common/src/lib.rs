//! Ratekeeper Common Types
//!
//! Shared types used across the ratekeeper workspace: currency codes,
//! normalized rate records and batches, cycle identifiers, the error
//! taxonomy and time helpers.

pub mod currency;
pub mod error;
pub mod identifiers;
pub mod record;
pub mod time;

pub use currency::*;
pub use error::*;
pub use identifiers::*;
pub use record::*;
pub use time::*;
