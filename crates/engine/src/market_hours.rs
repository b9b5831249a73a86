use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

/// Weekday trading window in the exchange's local timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketHours {
    timezone: Tz,
    open: NaiveTime,
    close: NaiveTime,
}

impl MarketHours {
    pub fn new(timezone: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            timezone,
            open,
            close,
        }
    }

    /// NSE/BSE cash session: 09:15–15:30 Asia/Kolkata.
    pub fn nse() -> Self {
        Self::new(
            chrono_tz::Asia::Kolkata,
            NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
            NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
        )
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn open(&self) -> NaiveTime {
        self.open
    }

    pub fn close(&self) -> NaiveTime {
        self.close
    }

    /// True on Monday–Friday while the local time is within `[open, close]`.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let time = local.time();
        self.open <= time && time <= self.close
    }

    /// "9:15 AM - 3:30 PM IST"-style summary for messages.
    pub fn describe(&self, now: DateTime<Utc>) -> String {
        let zone = now.with_timezone(&self.timezone).format("%Z").to_string();
        format!(
            "{} - {} {}",
            self.open.format("%-I:%M %p"),
            self.close.format("%-I:%M %p"),
            zone
        )
    }
}

impl Default for MarketHours {
    fn default() -> Self {
        Self::nse()
    }
}
