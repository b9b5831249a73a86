//! Telegram-ready (HTML parse mode) message bodies.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use common::{Direction, Instrument};

use crate::MarketHours;

/// Alert for a threshold-crossing move. `movement` is printed as a magnitude.
pub fn alert_message(
    instrument: &Instrument,
    direction: Direction,
    movement: f64,
    price: f64,
    candle_time: DateTime<Utc>,
    tz: Tz,
) -> String {
    let local = candle_time.with_timezone(&tz);
    format!(
        "🚨 <b>{name} ALERT</b> 🚨\n\
         \n\
         📊 <b>Direction:</b> {direction}\n\
         📈 <b>Movement:</b> {movement:.2} points\n\
         💰 <b>Current:</b> {price:.2}\n\
         ⏰ <b>Time:</b> {time}\n\
         \n\
         ✅ Threshold: {threshold}+ points",
        name = instrument.name,
        movement = movement.abs(),
        time = local.format("%H:%M %Z"),
        threshold = instrument.threshold,
    )
}

/// Sent once when the monitor auto-starts.
pub fn startup_message(instruments: &[Instrument], hours: &MarketHours, now: DateTime<Utc>) -> String {
    let mut text = String::from("🚀 <b>INDEX MONITOR STARTED</b>\n\n");
    for instrument in instruments {
        text.push_str(&format!(
            "📈 <b>{}:</b> {}+ points threshold\n",
            instrument.name, instrument.threshold
        ));
    }
    text.push_str("✅ <b>Auto-monitoring:</b> Active\n");
    text.push_str(&format!("🕒 <b>Market Hours:</b> {}", hours.describe(now)));
    text
}
