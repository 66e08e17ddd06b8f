//! Ratekeeper Service
//!
//! Wires the collector and the store into scheduled ingestion cycles and
//! exposes rate lookups to the front end.

pub mod config;
pub mod job;
pub mod metrics;
pub mod outcome;
pub mod reporter;
pub mod scheduler;
pub mod service;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{LogFormat, ServiceConfig};
pub use job::IngestionJob;
pub use metrics::{Metrics, MetricsSnapshot, SharedMetrics};
pub use outcome::{IngestionOutcome, SourceOutcome};
pub use reporter::{ChannelReporter, OutcomeReporter, TracingReporter};
pub use scheduler::IngestionScheduler;
pub use service::{RateQuote, RateService};
pub use state::ServiceState;
