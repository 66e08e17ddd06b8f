//! SQLite-backed rate store.

use std::path::Path;

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use ratekeeper_common::{CurrencyCode, RateBatch, RateRecord, RateSource, RateValues, Timestamp};

use crate::error::{StoreError, StoreResult};
use crate::repository::{RateStore, UpsertAction, UpsertSummary};

/// Textual timestamp layout of the `observed_at` columns (UTC).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Path value selecting a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

fn table(source: RateSource) -> &'static str {
    match source {
        RateSource::Api => "api_rates",
        RateSource::Scrape => "scrape_rates",
    }
}

/// Rate store over a SQLite database with one table per source.
///
/// Upserts for both sources share one writer lock; SQLite admits a single
/// writer per database file.
pub struct SqliteRateStore {
    pool: SqlitePool,
    writer: Mutex<()>,
}

impl SqliteRateStore {
    /// Open (creating if needed) the database at `path` and apply migrations.
    ///
    /// `":memory:"` opens a private in-memory database.
    #[instrument]
    pub async fn connect(path: &str) -> StoreResult<Self> {
        if path == IN_MEMORY {
            return Self::in_memory().await;
        }

        let file = Path::new(path);
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Location(format!("{}: {}", parent.display(), e)))?;
        }

        let options = SqliteConnectOptions::new().filename(file).create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        info!(path, "Opened rate store");
        Self::from_pool(pool).await
    }

    /// Open a private in-memory database.
    pub async fn in_memory() -> StoreResult<Self> {
        // One long-lived connection: every new connection would see an empty database.
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying migrations.
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            writer: Mutex::new(()),
        })
    }

    /// Close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RateStore for SqliteRateStore {
    #[instrument(skip(self, batch), fields(source = %batch.source, cycle_id = %batch.cycle_id, records = batch.len()))]
    async fn upsert(&self, batch: &RateBatch) -> StoreResult<UpsertSummary> {
        let _writer = self.writer.lock().await;

        let mut tx = self.pool.begin().await?;
        let mut summary = UpsertSummary::default();

        for record in batch.records() {
            if record.source() != batch.source {
                return Err(StoreError::SourceMismatch {
                    batch: batch.source,
                    record: record.source(),
                });
            }

            let existing = select_values(&mut tx, batch.source, &record.currency_code).await?;
            let action = UpsertAction::reconcile(existing.as_ref(), &record.values);
            if action != UpsertAction::Unchanged {
                write_row(&mut tx, record).await?;
            }
            summary.record(action);
        }

        tx.commit().await?;

        debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            unchanged = summary.unchanged,
            "Batch reconciled"
        );
        Ok(summary)
    }

    async fn lookup(&self, source: RateSource, code: &CurrencyCode) -> StoreResult<Option<RateRecord>> {
        let sql = match source {
            RateSource::Api => {
                "SELECT currency_code, usd_to_currency, euro_to_currency, observed_at FROM api_rates WHERE currency_code = ?1"
            }
            RateSource::Scrape => {
                "SELECT currency_code, buy_aed, sell_aed, observed_at FROM scrape_rates WHERE currency_code = ?1"
            }
        };

        let row = sqlx::query(sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| record_from_row(source, &row)).transpose()
    }

    async fn count(&self, source: RateSource) -> StoreResult<u64> {
        let sql = format!("SELECT COUNT(*) AS count FROM {}", table(source));
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }
}

async fn select_values(
    conn: &mut SqliteConnection,
    source: RateSource,
    code: &CurrencyCode,
) -> StoreResult<Option<RateValues>> {
    let sql = match source {
        RateSource::Api => "SELECT usd_to_currency, euro_to_currency FROM api_rates WHERE currency_code = ?1",
        RateSource::Scrape => "SELECT buy_aed, sell_aed FROM scrape_rates WHERE currency_code = ?1",
    };

    let row = sqlx::query(sql)
        .bind(code.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|row| values_from_row(source, &row)).transpose()
}

async fn write_row(conn: &mut SqliteConnection, record: &RateRecord) -> StoreResult<()> {
    let observed_at = format_timestamp(record.observed_at);

    match record.values {
        RateValues::Api {
            usd_to_currency,
            euro_to_currency,
        } => {
            sqlx::query(
                r#"
                INSERT INTO api_rates (currency_code, usd_to_currency, euro_to_currency, observed_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(currency_code) DO UPDATE SET
                    usd_to_currency = excluded.usd_to_currency,
                    euro_to_currency = excluded.euro_to_currency,
                    observed_at = excluded.observed_at
                "#,
            )
            .bind(record.currency_code.as_str())
            .bind(usd_to_currency)
            .bind(euro_to_currency)
            .bind(observed_at)
            .execute(&mut *conn)
            .await?;
        }
        RateValues::Scrape { buy_aed, sell_aed } => {
            sqlx::query(
                r#"
                INSERT INTO scrape_rates (currency_code, buy_aed, sell_aed, observed_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(currency_code) DO UPDATE SET
                    buy_aed = excluded.buy_aed,
                    sell_aed = excluded.sell_aed,
                    observed_at = excluded.observed_at
                "#,
            )
            .bind(record.currency_code.as_str())
            .bind(buy_aed)
            .bind(sell_aed)
            .bind(observed_at)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

fn values_from_row(source: RateSource, row: &SqliteRow) -> StoreResult<RateValues> {
    Ok(match source {
        RateSource::Api => RateValues::Api {
            usd_to_currency: row.try_get("usd_to_currency")?,
            euro_to_currency: row.try_get("euro_to_currency")?,
        },
        RateSource::Scrape => RateValues::Scrape {
            buy_aed: row.try_get("buy_aed")?,
            sell_aed: row.try_get("sell_aed")?,
        },
    })
}

fn record_from_row(source: RateSource, row: &SqliteRow) -> StoreResult<RateRecord> {
    let corrupt = |reason: String| StoreError::Corrupt {
        table: table(source),
        reason,
    };

    let raw_code: String = row.try_get("currency_code")?;
    let currency_code = CurrencyCode::parse(&raw_code).map_err(|e| corrupt(e.to_string()))?;
    let raw_at: String = row.try_get("observed_at")?;
    let observed_at = parse_timestamp(&raw_at).ok_or_else(|| corrupt(format!("bad timestamp `{}`", raw_at)))?;

    Ok(RateRecord {
        currency_code,
        values: values_from_row(source, row)?,
        observed_at,
    })
}

fn format_timestamp(at: Timestamp) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
