pub mod config;
pub mod error;
pub mod sources;
pub mod types;

pub use config::{Config, InstrumentFileConfig};
pub use error::{Error, LifecycleError, Result};
pub use sources::{CandleFetcher, CandleLedger, Clock, Notifier, SystemClock};
pub use types::*;
