use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// One minute bar from the price feed. Only the close is used for alerting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Provider ticker the bar was fetched for, e.g. "^NSEI".
    pub instrument: String,
    /// Bar start time, normalized to UTC.
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

/// Timestamp shapes a provider may hand back for a bar.
///
/// The Yahoo chart adapter only reports `Epoch`. `Naive` and `Zoned` cover
/// feeds that send wall-clock strings, so any `CandleFetcher` can normalize
/// through the same path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BarTime {
    /// Unix seconds.
    Epoch(i64),
    /// Wall time without a zone. Treated as UTC.
    Naive(NaiveDateTime),
    /// Wall time with an explicit offset.
    Zoned(DateTime<FixedOffset>),
}

impl BarTime {
    /// Convert to UTC. `None` when the epoch value is out of range.
    pub fn normalize(self) -> Option<DateTime<Utc>> {
        match self {
            BarTime::Epoch(secs) => Utc.timestamp_opt(secs, 0).single(),
            BarTime::Naive(naive) => Some(Utc.from_utc_datetime(&naive)),
            BarTime::Zoned(zoned) => Some(zoned.with_timezone(&Utc)),
        }
    }
}

/// Dedup key for a bar: instrument display name plus the minute bucket in the
/// market timezone. Seconds and sub-seconds never reach the key, so every poll
/// inside one bucket derives the same id.
pub fn candle_id(instrument_name: &str, timestamp: DateTime<Utc>, tz: Tz) -> String {
    let local = timestamp.with_timezone(&tz);
    format!("{}_{}", instrument_name, local.format("%Y%m%d_%H%M"))
}

/// Direction of a close-to-close movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Zero movement counts as `Down`.
    pub fn from_movement(movement: f64) -> Self {
        if movement > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// A tracked index with its alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Display name, e.g. "NIFTY 50". Part of every candle id.
    pub name: String,
    /// Provider ticker, e.g. "^NSEI".
    pub symbol: String,
    /// Minimum absolute close-to-close movement, in index points.
    pub threshold: f64,
}

impl Instrument {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, threshold: f64) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            threshold,
        }
    }

    /// NIFTY 50 and BSE SENSEX, the indices watched when no instrument file is configured.
    pub fn defaults() -> Vec<Instrument> {
        vec![
            Instrument::new("NIFTY 50", "^NSEI", 8.0),
            Instrument::new("BSE SENSEX", "^BSESN", 12.0),
        ]
    }
}

/// Ledger row for a bucket that has been evaluated, alert or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedCandleRecord {
    pub candle_id: String,
    /// Local market time, e.g. "2024-01-15 10:00:00 IST".
    pub timestamp: String,
    pub instrument: String,
    pub price: f64,
    /// Signed close-to-close movement.
    pub movement: f64,
    pub direction: Direction,
    /// Whether the movement crossed the threshold (not whether delivery succeeded).
    pub alert_sent: bool,
}

/// Ledger row for a fired alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub candle_id: String,
    pub direction: Direction,
    /// Absolute movement.
    pub movement: f64,
    pub price: f64,
    pub instrument: String,
    pub timestamp: String,
    pub delivery_sent: bool,
}

/// Compact alert projection kept in memory for the status facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertHistoryEntry {
    /// Local candle time, "HH:MM".
    pub time: String,
    pub index: String,
    pub direction: Direction,
    pub movement: f64,
    pub price: f64,
    pub sent: bool,
}

impl From<&AlertRecord> for AlertHistoryEntry {
    fn from(record: &AlertRecord) -> Self {
        // Record timestamps are "%Y-%m-%d %H:%M:%S %Z"; the entry only keeps HH:MM.
        let time = record
            .timestamp
            .split_whitespace()
            .nth(1)
            .and_then(|t| t.get(..5))
            .unwrap_or_default()
            .to_string();
        Self {
            time,
            index: record.instrument.clone(),
            direction: record.direction,
            movement: record.movement,
            price: record.price,
            sent: record.delivery_sent,
        }
    }
}

/// Lifecycle state of the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    #[default]
    Stopped,
    Running,
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorState::Stopped => write!(f, "stopped"),
            MonitorState::Running => write!(f, "running"),
        }
    }
}
