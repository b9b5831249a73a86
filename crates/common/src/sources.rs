use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{AlertRecord, Candle, ProcessedCandleRecord, Result};

/// Source of recent minute candles.
///
/// `YahooClient` implements this against the public chart API. Implementations
/// validate the provider payload and only ever hand back well-formed `Candle`s.
#[async_trait]
pub trait CandleFetcher: Send + Sync {
    /// Recent 1-minute candles for `symbol`, most recent last. The last element
    /// is the bar still forming; the one before it is the last settled bar.
    async fn fetch(&self, symbol: &str) -> Result<Vec<Candle>>;
}

/// A single delivery attempt to the messaging channel.
///
/// Retry and backoff live in `engine::NotificationSink`, not here.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Durable record of evaluated candle buckets and fired alerts.
///
/// None of these operations fail from the caller's point of view: reads fail
/// open (a storage error reads as "not processed") and write errors are logged
/// and dropped by the implementation.
#[async_trait]
pub trait CandleLedger: Send + Sync {
    async fn has_processed(&self, candle_id: &str) -> bool;

    /// Upsert keyed by `candle_id`; the last write wins.
    async fn record_processed(&self, record: &ProcessedCandleRecord);

    /// Append-only.
    async fn record_alert(&self, record: &AlertRecord);
}

/// Wall clock, injectable so market-hours decisions can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
