//! Batch instrument fetcher.
//!
//! Requests every instrument concurrently, each under its own timeout, and
//! maps failures to `Availability::Unavailable` so partial results survive.
//! No retries happen here; the caller decides when to try again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::config::InstrumentConfig;
use common::{Availability, Error, PriceWindow};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::PriceFeed;

/// Result of one batch fetch, keyed by instrument id.
pub type FetchOutcome = HashMap<String, Availability<PriceWindow>>;

#[derive(Clone)]
pub struct InstrumentFetcher {
    feed: Arc<dyn PriceFeed>,
    timeout: Duration,
    window_len: usize,
}

impl InstrumentFetcher {
    pub fn new(feed: Arc<dyn PriceFeed>, timeout: Duration, window_len: usize) -> Self {
        Self {
            feed,
            timeout,
            window_len,
        }
    }

    /// Fetch every instrument's window. Never fails as a whole.
    pub async fn fetch_all(&self, instruments: &[InstrumentConfig]) -> FetchOutcome {
        let requests = instruments.iter().map(|inst| async move {
            let data = self.fetch_one(inst).await;
            (inst.id.clone(), data)
        });

        join_all(requests).await.into_iter().collect()
    }

    async fn fetch_one(&self, inst: &InstrumentConfig) -> Availability<PriceWindow> {
        let result = tokio::time::timeout(self.timeout, self.feed.fetch_series(&inst.symbol)).await;

        let points = match result {
            Ok(Ok(points)) => points,
            Ok(Err(e)) => {
                warn!("Failed to fetch {} ({}): {}", inst.id, inst.symbol, e);
                return Availability::unavailable(e.to_string());
            }
            Err(_) => {
                let e = Error::Timeout {
                    symbol: inst.symbol.clone(),
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                };
                warn!("{}", e);
                return Availability::unavailable(e.to_string());
            }
        };

        let mut usable: Vec<_> = points
            .into_iter()
            .filter(|p| p.price.is_finite() && p.price > 0.0)
            .collect();
        if usable.is_empty() {
            warn!("{} ({}): feed returned no usable prices", inst.id, inst.symbol);
            return Availability::unavailable("no price data");
        }
        usable.sort_by_key(|p| p.timestamp);

        let window = PriceWindow::from_points(self.window_len, usable);
        debug!(
            "{}: {} points, latest={:?}",
            inst.id,
            window.len(),
            window.latest().map(|p| p.price)
        );
        Availability::Available(window)
    }
}
