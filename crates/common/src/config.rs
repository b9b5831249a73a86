use std::collections::HashSet;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{Error, Instrument, Result};

/// All configuration loaded from environment variables at startup.
/// Missing required variables or malformed values cause an immediate panic
/// with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    pub telegram_chat_id: i64,
    /// Operators allowed to drive the monitor from Telegram. Empty disables the command bot.
    pub telegram_allowed_user_ids: Vec<i64>,

    // Status API
    pub port: u16,

    // Database
    pub database_url: String,

    // Instruments
    pub instruments_config_path: Option<String>,

    // Market hours
    pub market_timezone: Tz,
    pub market_open: NaiveTime,
    pub market_close: NaiveTime,

    // Monitor loop
    pub poll_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub notify_max_attempts: u32,
    pub notify_backoff_base_secs: u64,
    pub auto_start: bool,
    pub auto_start_delay_secs: u64,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let telegram_chat_id = required_env("TELEGRAM_CHAT_ID")
            .trim()
            .parse::<i64>()
            .unwrap_or_else(|_| panic!("TELEGRAM_CHAT_ID must be a numeric chat id"));

        let telegram_allowed_user_ids = optional_env("TELEGRAM_ALLOWED_USER_IDS")
            .map(|raw| {
                parse_id_list(&raw).unwrap_or_else(|e| panic!("TELEGRAM_ALLOWED_USER_IDS: {e}"))
            })
            .unwrap_or_default();

        let market_timezone = optional_env("MARKET_TIMEZONE")
            .map(|name| parse_timezone(&name).unwrap_or_else(|e| panic!("MARKET_TIMEZONE: {e}")))
            .unwrap_or(chrono_tz::Asia::Kolkata);

        let market_open = time_env("MARKET_OPEN", "09:15");
        let market_close = time_env("MARKET_CLOSE", "15:30");

        let cfg = Config {
            telegram_token: required_env("TELEGRAM_TOKEN"),
            telegram_chat_id,
            telegram_allowed_user_ids,
            port: parsed_env("PORT", 5000),
            database_url: optional_env("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://indexwatch.db".to_string()),
            instruments_config_path: optional_env("INSTRUMENTS_CONFIG_PATH"),
            market_timezone,
            market_open,
            market_close,
            poll_interval_secs: parsed_env("POLL_INTERVAL_SECS", 10),
            fetch_timeout_secs: parsed_env("FETCH_TIMEOUT_SECS", 10),
            notify_max_attempts: parsed_env("NOTIFY_MAX_ATTEMPTS", 5),
            notify_backoff_base_secs: parsed_env("NOTIFY_BACKOFF_BASE_SECS", 1),
            auto_start: parsed_env("AUTO_START", true),
            auto_start_delay_secs: parsed_env("AUTO_START_DELAY_SECS", 5),
        };
        cfg.validate().unwrap_or_else(|e| panic!("{e}"));
        cfg
    }

    /// Reject values that parse but would break the monitor loop.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("POLL_INTERVAL_SECS must be at least 1".into()));
        }
        if self.notify_max_attempts == 0 {
            return Err(Error::Config("NOTIFY_MAX_ATTEMPTS must be at least 1".into()));
        }
        Ok(())
    }

    /// Instruments from `INSTRUMENTS_CONFIG_PATH`, or the built-in NIFTY/SENSEX pair.
    pub fn instruments(&self) -> Vec<Instrument> {
        match &self.instruments_config_path {
            Some(path) => InstrumentFileConfig::load(path).instruments,
            None => Instrument::defaults(),
        }
    }
}

/// Instrument list file (TOML).
///
/// Example `config/instruments.toml`:
/// ```toml
/// [[instrument]]
/// name = "NIFTY 50"
/// symbol = "^NSEI"
/// threshold = 8.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstrumentFileConfig {
    #[serde(rename = "instrument")]
    pub instruments: Vec<Instrument>,
}

impl InstrumentFileConfig {
    /// Load from a TOML file. Panics on error.
    pub fn load(path: &str) -> Self {
        let content = std::fs::read_to_string(path).unwrap_or_else(|e| {
            panic!("Failed to read instrument config at '{path}': {e}")
        });
        Self::parse(&content).unwrap_or_else(|e| {
            panic!("Failed to parse instrument config at '{path}': {e}")
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        if cfg.instruments.is_empty() {
            return Err(Error::Config("at least one [[instrument]] is required".into()));
        }
        if let Some(bad) = cfg.instruments.iter().find(|i| i.threshold.is_nan() || i.threshold <= 0.0) {
            return Err(Error::Config(format!(
                "threshold for '{}' must be positive, got {}",
                bad.name, bad.threshold
            )));
        }
        // Names key the candle ids, so two instruments sharing one would share buckets.
        let mut seen = HashSet::new();
        if let Some(dup) = cfg.instruments.iter().find(|i| !seen.insert(i.name.as_str())) {
            return Err(Error::Config(format!(
                "instrument name '{}' is used more than once",
                dup.name
            )));
        }
        Ok(cfg)
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| Error::Config(format!("unknown timezone '{name}': {e}")))
}

/// Parse "HH:MM" (or "HH:MM:SS").
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| Error::Config(format!("expected HH:MM, got '{raw}'")))
}

fn parse_id_list(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("non-numeric ID: '{s}'")))
        })
        .collect()
}

fn time_env(key: &str, default: &str) -> NaiveTime {
    let raw = optional_env(key).unwrap_or_else(|| default.to_string());
    parse_time_of_day(&raw).unwrap_or_else(|e| panic!("{key}: {e}"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("Environment variable '{key}' has an invalid value: '{raw}'")),
        None => default,
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_instrument_file() {
        let cfg = InstrumentFileConfig::parse(
            r#"
            [[instrument]]
            name = "NIFTY 50"
            symbol = "^NSEI"
            threshold = 8.0

            [[instrument]]
            name = "BSE SENSEX"
            symbol = "^BSESN"
            threshold = 12.0
            "#,
        )
        .unwrap();

        assert_eq!(cfg.instruments, Instrument::defaults());
    }

    #[test]
    fn rejects_empty_instrument_file() {
        let err = InstrumentFileConfig::parse("instrument = []").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_non_positive_threshold() {
        let err = InstrumentFileConfig::parse(
            r#"
            [[instrument]]
            name = "X"
            symbol = "X"
            threshold = 0.0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be positive"));
    }

    #[test]
    fn rejects_duplicate_instrument_names() {
        let err = InstrumentFileConfig::parse(
            r#"
            [[instrument]]
            name = "NIFTY"
            symbol = "^NSEI"
            threshold = 8.0

            [[instrument]]
            name = "NIFTY"
            symbol = "^NSEBANK"
            threshold = 20.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("'NIFTY' is used more than once"));
    }

    fn sample_config() -> Config {
        Config {
            telegram_token: "123:test".into(),
            telegram_chat_id: 42,
            telegram_allowed_user_ids: Vec::new(),
            port: 5000,
            database_url: "sqlite::memory:".into(),
            instruments_config_path: None,
            market_timezone: chrono_tz::Asia::Kolkata,
            market_open: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            market_close: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            poll_interval_secs: 10,
            fetch_timeout_secs: 10,
            notify_max_attempts: 5,
            notify_backoff_base_secs: 1,
            auto_start: true,
            auto_start_delay_secs: 5,
        }
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let cfg = Config {
            poll_interval_secs: 0,
            ..sample_config()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("POLL_INTERVAL_SECS"));
    }

    #[test]
    fn zero_notify_attempts_is_rejected() {
        let cfg = Config {
            notify_max_attempts: 0,
            ..sample_config()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("NOTIFY_MAX_ATTEMPTS"));
    }

    #[test]
    fn time_of_day_accepts_minutes_and_seconds() {
        assert_eq!(
            parse_time_of_day("09:15").unwrap(),
            NaiveTime::from_hms_opt(9, 15, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day(" 15:30:00 ").unwrap(),
            NaiveTime::from_hms_opt(15, 30, 0).unwrap()
        );
        assert!(parse_time_of_day("9am").is_err());
    }

    #[test]
    fn timezone_names_resolve() {
        assert_eq!(parse_timezone("Asia/Kolkata").unwrap(), chrono_tz::Asia::Kolkata);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn id_list_skips_blanks_and_rejects_garbage() {
        assert_eq!(parse_id_list("1, 2,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_id_list("1,abc").is_err());
    }
}
