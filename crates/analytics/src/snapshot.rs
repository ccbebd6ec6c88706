//! Snapshot assembly.
//!
//! One refresh cycle = one batch fetch, then scoring and pair evaluation
//! over exactly that batch, stamped with a single timestamp.

use chrono::{DateTime, Utc};
use common::config::InstrumentConfig;
use common::{Availability, Error, Instrument, MonitorConfig, Result};
use market_feed::InstrumentFetcher;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pairs::{PairSignal, PairSignalEngine};
use crate::risk::{RiskScore, RiskScorer};

/// Immutable result of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub fetched_at: DateTime<Utc>,
    /// Instruments in configured order, available or not.
    pub instruments: Vec<Instrument>,
    pub risk: RiskScore,
    pub pairs: Vec<PairSignal>,
}

impl MarketSnapshot {
    pub fn instrument(&self, id: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }

    pub fn available_count(&self) -> usize {
        self.instruments.iter().filter(|i| i.is_available()).count()
    }
}

#[derive(Clone)]
pub struct SnapshotAssembler {
    fetcher: InstrumentFetcher,
    instruments: Vec<InstrumentConfig>,
    scorer: RiskScorer,
    pairs: PairSignalEngine,
}

impl SnapshotAssembler {
    pub fn new(fetcher: InstrumentFetcher, config: &MonitorConfig) -> Self {
        Self {
            fetcher,
            instruments: config.instruments.clone(),
            scorer: RiskScorer::new(config.risk_factors.clone()),
            pairs: PairSignalEngine::new(config.pairs.clone()),
        }
    }

    /// Run one full cycle.
    ///
    /// Partial feed failure still yields a complete snapshot; only a batch
    /// with no available instrument is an error.
    pub async fn assemble(&self) -> Result<MarketSnapshot> {
        let mut fetched = self.fetcher.fetch_all(&self.instruments).await;
        let fetched_at = Utc::now();

        let instruments: Vec<Instrument> = self
            .instruments
            .iter()
            .map(|cfg| Instrument {
                id: cfg.id.clone(),
                symbol: cfg.symbol.clone(),
                name: cfg.name.clone(),
                unit: cfg.unit,
                data: fetched
                    .remove(&cfg.id)
                    .unwrap_or_else(|| Availability::unavailable("not fetched")),
            })
            .collect();

        let available = instruments.iter().filter(|i| i.is_available()).count();
        let failed = instruments.len() - available;
        if available == 0 {
            warn!("Refresh failed: all {} instruments unavailable", failed);
            return Err(Error::FeedUnavailable { failed });
        }

        let risk = self.scorer.score(&instruments);
        let pairs = self.pairs.evaluate(&instruments);

        info!(
            "Snapshot assembled: {}/{} instruments, risk={:.1} ({}), pairs={}",
            available,
            instruments.len(),
            risk.value,
            risk.band.label(),
            pairs.len()
        );

        Ok(MarketSnapshot {
            fetched_at,
            instruments,
            risk,
            pairs,
        })
    }
}
