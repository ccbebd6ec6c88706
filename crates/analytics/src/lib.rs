//! Market analytics core.
//!
//! Turns fetched instrument windows into one consistent `MarketSnapshot`
//! (risk score plus pair signals), caches it under a TTL, and serves it to
//! commands, the dashboard, and the scheduled alert loop.

pub mod alerts;
pub mod cache;
pub mod commands;
pub mod pairs;
pub mod report;
pub mod risk;
pub mod snapshot;

#[cfg(test)]
mod fixtures;

pub use alerts::{AlertScheduler, AlertSink, AlertState, SubscriberRegistry, TickReport};
pub use cache::SnapshotCache;
pub use commands::MarketCommands;
pub use pairs::{PairReading, PairSignal, PairSignalEngine, SpreadStage};
pub use risk::{RiskBand, RiskFactor, RiskScore, RiskScorer};
pub use snapshot::{MarketSnapshot, SnapshotAssembler};
