use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use common::{BarTime, Candle, CandleFetcher, Error, Result};

const BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Yahoo Finance chart API client. Fetches today's 1-minute bars.
pub struct YahooClient {
    http: Client,
    base_url: Url,
}

impl YahooClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::Config(e.to_string()))?;
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .user_agent(concat!("indexwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    fn chart_url(&self, symbol: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("cannot build chart URL from '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("interval", "1m")
            .append_pair("range", "1d");
        Ok(url)
    }
}

#[async_trait]
impl CandleFetcher for YahooClient {
    async fn fetch(&self, symbol: &str) -> Result<Vec<Candle>> {
        let url = self.chart_url(symbol)?;
        debug!(%symbol, %url, "Fetching chart");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::DataSource(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::DataSource(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::DataSource(format!("HTTP {status} for {symbol}")));
        }

        parse_chart(symbol, &body)
    }
}

/// Convert a chart payload into candles, oldest first.
///
/// Bars with a `null` close (common for the bar still forming) or an
/// unrepresentable timestamp are dropped.
pub fn parse_chart(symbol: &str, body: &str) -> Result<Vec<Candle>> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|e| Error::DataSource(format!("bad chart payload: {e}")))?;

    if let Some(err) = envelope.chart.error {
        return Err(Error::DataSource(format!(
            "{}: {}",
            err.code,
            err.description.unwrap_or_default()
        )));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let mut candles: Vec<Candle> = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(&ts, close)| {
            let close = close.filter(|c| c.is_finite())?;
            let timestamp = BarTime::Epoch(ts).normalize()?;
            Some(Candle {
                instrument: symbol.to_string(),
                timestamp,
                close,
            })
        })
        .collect();

    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}
