//! Periodic ingestion driver.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{info, instrument, warn};

use crate::service::RateService;

/// Runs an ingestion cycle at start-up and then every `interval`.
pub struct IngestionScheduler {
    service: Arc<RateService>,
    interval: Duration,
    cycle_timeout: Duration,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl IngestionScheduler {
    /// Create a scheduler for `service`.
    pub fn new(service: Arc<RateService>, interval: Duration, cycle_timeout: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Self {
            service,
            interval,
            cycle_timeout,
            shutdown_tx,
            shutdown_rx: Mutex::new(Some(shutdown_rx)),
        }
    }

    /// Handle that stops the scheduler when sent to.
    pub fn shutdown_handle(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Signal the scheduler to stop.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }

    /// Drive cycles until shutdown. A cycle in flight when shutdown arrives
    /// is dropped. Returns immediately if called a second time.
    #[instrument(skip(self), fields(interval_secs = self.interval.as_secs()))]
    pub async fn run(&self) {
        let Some(mut shutdown) = self.shutdown_rx.lock().take() else {
            warn!("Scheduler already ran");
            return;
        };

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Ingestion scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {}
            }

            if !self.service.state().accepts_cycles() {
                info!(state = ?self.service.state(), "Service no longer accepts cycles");
                break;
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    warn!("Shutdown during ingestion cycle, abandoning it");
                    break;
                }
                _ = self.run_once() => {}
            }
        }

        info!("Ingestion scheduler stopped");
    }

    /// Run one bounded cycle.
    async fn run_once(&self) {
        match timeout(self.cycle_timeout, self.service.run_ingestion_cycle()).await {
            Ok(outcome) => {
                if outcome.is_unavailable() {
                    warn!(cycle_id = %outcome.cycle_id, "No source produced rates this cycle");
                }
            }
            Err(_) => {
                self.service.metrics().cycle_timed_out();
                warn!(
                    timeout_secs = self.cycle_timeout.as_secs(),
                    "Ingestion cycle timed out, abandoned"
                );
            }
        }
    }
}
