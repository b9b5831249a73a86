//! SQLite-backed ledger of evaluated candle buckets and fired alerts.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{error, info};

use common::{AlertRecord, CandleLedger, Direction, Error, ProcessedCandleRecord, Result};

/// An alert row as persisted, with its insert time.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StoredAlert {
    pub id: i64,
    #[serde(flatten)]
    pub record: AlertRecord,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: i64,
    candle_id: String,
    direction: Direction,
    movement: f64,
    price: f64,
    index_name: String,
    timestamp: String,
    telegram_sent: bool,
    created_at: String,
}

impl From<AlertRow> for StoredAlert {
    fn from(row: AlertRow) -> Self {
        Self {
            id: row.id,
            record: AlertRecord {
                candle_id: row.candle_id,
                direction: row.direction,
                movement: row.movement,
                price: row.price,
                instrument: row.index_name,
                timestamp: row.timestamp,
                delivery_sent: row.telegram_sent,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct SqliteLedger {
    db: SqlitePool,
}

impl SqliteLedger {
    /// Open (creating if missing) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;
        Self::from_pool(db).await
    }

    /// Private in-memory database on a single pinned connection.
    pub async fn in_memory() -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(db).await
    }

    pub async fn from_pool(db: SqlitePool) -> Result<Self> {
        sqlx::migrate!("../../migrations")
            .run(&db)
            .await
            .map_err(|e| Error::Other(format!("Database migration failed: {e}")))?;
        info!("Ledger ready");
        Ok(Self { db })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// True when the database answers a trivial query.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.db).await.is_ok()
    }

    pub async fn try_has_processed(&self, candle_id: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM processed_candles WHERE candle_id = ?1")
                .bind(candle_id)
                .fetch_one(&self.db)
                .await?;
        Ok(count > 0)
    }

    pub async fn try_record_processed(&self, record: &ProcessedCandleRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO processed_candles
                (candle_id, timestamp, index_name, price, movement, direction, alert_sent)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(candle_id) DO UPDATE SET
                timestamp  = excluded.timestamp,
                index_name = excluded.index_name,
                price      = excluded.price,
                movement   = excluded.movement,
                direction  = excluded.direction,
                alert_sent = excluded.alert_sent
            "#,
        )
        .bind(&record.candle_id)
        .bind(&record.timestamp)
        .bind(&record.instrument)
        .bind(record.price)
        .bind(record.movement)
        .bind(record.direction)
        .bind(record.alert_sent)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn try_record_alert(&self, record: &AlertRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts
                (candle_id, direction, movement, price, index_name, timestamp, telegram_sent)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&record.candle_id)
        .bind(record.direction)
        .bind(record.movement)
        .bind(record.price)
        .bind(&record.instrument)
        .bind(&record.timestamp)
        .bind(record.delivery_sent)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Persisted alerts, newest first.
    pub async fn recent_alerts(&self, limit: i64) -> Result<Vec<StoredAlert>> {
        let rows: Vec<AlertRow> = sqlx::query_as(
            r#"
            SELECT id, candle_id, direction, movement, price, index_name, timestamp,
                   telegram_sent, CAST(created_at AS TEXT) AS created_at
            FROM alerts
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(StoredAlert::from).collect())
    }

    pub async fn processed_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_candles")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl CandleLedger for SqliteLedger {
    async fn has_processed(&self, candle_id: &str) -> bool {
        match self.try_has_processed(candle_id).await {
            Ok(seen) => seen,
            Err(e) => {
                // Fail open: a possible duplicate beats a silently dropped alert.
                error!(%candle_id, error = %e, "Ledger read failed, treating candle as unprocessed");
                false
            }
        }
    }

    async fn record_processed(&self, record: &ProcessedCandleRecord) {
        if let Err(e) = self.try_record_processed(record).await {
            error!(candle_id = %record.candle_id, error = %e, "Failed to persist processed candle");
        }
    }

    async fn record_alert(&self, record: &AlertRecord) {
        if let Err(e) = self.try_record_alert(record).await {
            error!(candle_id = %record.candle_id, error = %e, "Failed to persist alert");
        }
    }
}
