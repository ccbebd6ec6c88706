//! Scripted in-memory feed for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use common::{Error, PricePoint, Result};

use crate::PriceFeed;

/// Serves fixed daily series per symbol, counting every call.
#[derive(Debug, Default, Clone)]
pub struct ScriptedFeed {
    series: Arc<Mutex<HashMap<String, Vec<f64>>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(self, symbol: &str, prices: &[f64]) -> Self {
        self.set_series(symbol, prices);
        self
    }

    pub fn set_series(&self, symbol: &str, prices: &[f64]) {
        if let Ok(mut map) = self.series.lock() {
            map.insert(symbol.to_string(), prices.to_vec());
        }
    }

    pub fn fail(&self, symbol: &str) {
        if let Ok(mut set) = self.failing.lock() {
            set.insert(symbol.to_string());
        }
    }

    pub fn recover(&self, symbol: &str) {
        if let Ok(mut set) = self.failing.lock() {
            set.remove(symbol);
        }
    }

    /// Delay every response for `symbol`.
    pub fn delay(&self, symbol: &str, by: Duration) {
        if let Ok(mut map) = self.delays.lock() {
            map.insert(symbol.to_string(), by);
        }
    }

    /// Delay every symbol.
    pub fn delay_all(&self, by: Duration) {
        let symbols: Vec<String> = match self.series.lock() {
            Ok(map) => map.keys().cloned().collect(),
            Err(_) => return,
        };
        for s in symbols {
            self.delay(&s, by);
        }
    }

    /// Total per-symbol requests served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for ScriptedFeed {
    async fn fetch_series(&self, symbol: &str) -> Result<Vec<PricePoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delays.lock().ok().and_then(|m| m.get(symbol).copied());
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        let failing = self
            .failing
            .lock()
            .map(|s| s.contains(symbol))
            .unwrap_or(false);
        if failing {
            return Err(Error::Feed {
                symbol: symbol.to_string(),
                message: "scripted failure".into(),
            });
        }

        let prices = self
            .series
            .lock()
            .ok()
            .and_then(|m| m.get(symbol).cloned())
            .ok_or_else(|| Error::Feed {
                symbol: symbol.to_string(),
                message: "unknown symbol".into(),
            })?;

        let start = DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default();
        Ok(prices
            .into_iter()
            .enumerate()
            .map(|(i, price)| PricePoint {
                timestamp: start + chrono::Duration::days(i as i64),
                price,
            })
            .collect())
    }
}
