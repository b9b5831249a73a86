pub mod evaluator;
pub mod lifecycle;
pub mod market_hours;
pub mod message;
pub mod notify;
pub mod status;
pub mod yahoo;

pub use evaluator::{evaluate, Evaluation};
pub use lifecycle::{CycleReport, InstrumentOutcome, Monitor, MonitorDeps, MonitorSettings};
pub use market_hours::MarketHours;
pub use notify::{NotificationSink, RetryPolicy};
pub use status::{MonitorStatus, HISTORY_CAPACITY};
pub use yahoo::YahooClient;
