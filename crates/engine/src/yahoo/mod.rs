mod chart;

pub use chart::{parse_chart, YahooClient};
