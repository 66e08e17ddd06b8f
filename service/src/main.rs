//! Ratekeeper Binary
//!
//! Collects FX rates from the rate API and the exchange kiosk on a schedule
//! and keeps the latest value per currency in SQLite.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratekeeper_service::{IngestionScheduler, LogFormat, RateService, ServiceConfig, TracingReporter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = ServiceConfig::from_env();

    let (json, pretty) = match config.log_format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(tracing_subscriber::fmt::layer().pretty())),
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(json)
        .with(pretty)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting ratekeeper");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let service = Arc::new(RateService::from_config(&config, Arc::new(TracingReporter)).await?);
    let scheduler = IngestionScheduler::new(service.clone(), config.ingest_interval, config.cycle_timeout);

    // Set up graceful shutdown
    let shutdown = scheduler.shutdown_handle();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Shutdown signal received");
        let _ = shutdown.send(()).await;
    });

    service.start();
    info!(
        interval_secs = config.ingest_interval.as_secs(),
        cycle_timeout_secs = config.cycle_timeout.as_secs(),
        store = %config.store_path,
        "Ratekeeper running"
    );

    scheduler.run().await;
    service.stop().await;

    let metrics = service.metrics().snapshot();
    info!(
        cycles = metrics.cycles_total,
        partial_cycles = metrics.cycles_partial,
        timed_out_cycles = metrics.cycles_timed_out,
        api_rows_written = metrics.api_rows_written,
        scrape_rows_written = metrics.scrape_rows_written,
        "Ratekeeper shutdown complete"
    );
    Ok(())
}
