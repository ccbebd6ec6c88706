//! Yahoo Finance chart API client.
//!
//! Reads `/v8/finance/chart/{symbol}` and keeps the close series.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use common::config::FeedConfig;
use common::{Error, PricePoint, Result};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::rate_limit::RateLimiter;
use crate::PriceFeed;

fn format_reqwest_error(err: &reqwest::Error) -> String {
    // Keep chained causes so DNS/TLS/socket failures are visible.
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

// ── Chart response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct ChartEnvelope {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteBlock {
    /// Null entries mark bars with no trade.
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}

/// Convert a chart response into a chronological close series.
///
/// Bars without a close are skipped; they never become zero prices.
pub fn parse_series(symbol: &str, resp: ChartResponse) -> Result<Vec<PricePoint>> {
    if let Some(err) = resp.chart.error {
        return Err(Error::Feed {
            symbol: symbol.to_string(),
            message: format!("{}: {}", err.code, err.description),
        });
    }

    let result = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| Error::Feed {
            symbol: symbol.to_string(),
            message: "empty chart result".into(),
        })?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let mut skipped = 0usize;
    let mut points: Vec<PricePoint> = Vec::with_capacity(closes.len());
    for (ts, close) in result.timestamp.iter().zip(closes) {
        match (DateTime::from_timestamp(*ts, 0), close) {
            (Some(timestamp), Some(price)) if price.is_finite() && price > 0.0 => {
                points.push(PricePoint { timestamp, price });
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("{}: skipped {} bars without a usable close", symbol, skipped);
    }

    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

/// Chart API client with a shared rate limiter.
#[derive(Debug, Clone)]
pub struct YahooChartClient {
    client: reqwest::Client,
    base_url: String,
    range: String,
    interval: String,
    limiter: RateLimiter,
}

impl YahooChartClient {
    pub fn new(cfg: &FeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (market-monitor/0.1)")
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Http(format!("failed to build chart client: {}", e)))?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim().trim_end_matches('/').to_string(),
            range: cfg.range.clone(),
            interval: cfg.interval.clone(),
            limiter: RateLimiter::per_second(cfg.requests_per_sec),
        })
    }

    fn chart_url(&self, symbol: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid feed base_url {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("feed base_url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(&["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("range", &self.range)
            .append_pair("interval", &self.interval);
        Ok(url)
    }
}

#[async_trait]
impl PriceFeed for YahooChartClient {
    async fn fetch_series(&self, symbol: &str) -> Result<Vec<PricePoint>> {
        let url = self.chart_url(symbol)?;
        self.limiter.wait().await;

        debug!("Fetching chart: {}", url);

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", symbol, format_reqwest_error(&e))))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(300).collect();
            return Err(Error::Feed {
                symbol: symbol.to_string(),
                message: format!("chart API returned {}: {}", status, excerpt),
            });
        }

        let data: ChartResponse = resp.json().await.map_err(|e| Error::Feed {
            symbol: symbol.to_string(),
            message: format!("JSON parse error: {}", e),
        })?;

        parse_series(symbol, data)
    }
}
