//! Unified error type for the market monitor.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Feed error for {symbol}: {message}")]
    Feed { symbol: String, message: String },

    #[error("Feed timed out for {symbol} after {timeout_ms}ms")]
    Timeout { symbol: String, timeout_ms: u64 },

    #[error("No instrument could be fetched ({failed} failed)")]
    FeedUnavailable { failed: usize },

    #[error("Alert delivery to {subscriber} failed: {message}")]
    Delivery { subscriber: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
