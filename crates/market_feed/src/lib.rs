//! Instrument price feed.
//!
//! Fetches recent chart series for each configured instrument and turns
//! them into rolling price windows. One instrument failing never aborts
//! the batch.

pub mod fetcher;
pub mod rate_limit;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod yahoo;

use async_trait::async_trait;
use common::{PricePoint, Result};

pub use fetcher::{FetchOutcome, InstrumentFetcher};
pub use rate_limit::RateLimiter;
pub use yahoo::YahooChartClient;

/// A source of historical prices for a single symbol.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Return the recent series for `symbol`, oldest first.
    async fn fetch_series(&self, symbol: &str) -> Result<Vec<PricePoint>>;
}
