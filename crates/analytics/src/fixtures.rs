//! Shared test configuration.

use std::sync::Arc;
use std::time::Duration;

use common::config::{
    FactorKind, InstrumentConfig, MoveDirection, PairConfig, RiskFactorConfig, SpreadMethod,
};
use common::{MonitorConfig, Unit};
use market_feed::testing::ScriptedFeed;
use market_feed::InstrumentFetcher;

use crate::cache::SnapshotCache;
use crate::snapshot::SnapshotAssembler;

/// GOLD and SILVER, one z-score pair, one move factor per leg.
pub fn gold_silver_config() -> MonitorConfig {
    let inst = |id: &str, name: &str| InstrumentConfig {
        id: id.into(),
        symbol: id.into(),
        name: name.into(),
        unit: Unit::Currency,
        headline: true,
    };
    MonitorConfig {
        instruments: vec![inst("GOLD", "Gold"), inst("SILVER", "Silver")],
        pairs: vec![PairConfig::spread(
            "Gold/Silver",
            "GOLD",
            "SILVER",
            SpreadMethod::ZScore,
            1.0,
            2.0,
        )],
        risk_factors: vec![
            RiskFactorConfig {
                label: "Gold bid".into(),
                weight: 1.0,
                kind: FactorKind::Move {
                    instrument: "GOLD".into(),
                    direction: MoveDirection::Up,
                    scale_pct: 10.0,
                },
            },
            RiskFactorConfig {
                label: "Silver swing".into(),
                weight: 1.0,
                kind: FactorKind::Move {
                    instrument: "SILVER".into(),
                    direction: MoveDirection::Both,
                    scale_pct: 10.0,
                },
            },
        ],
        ..MonitorConfig::default()
    }
}

pub fn gold_silver_feed() -> ScriptedFeed {
    ScriptedFeed::new()
        .with_series("GOLD", &[100.0, 101.0, 99.0, 105.0])
        .with_series("SILVER", &[20.0, 20.5, 19.0, 21.0])
}

pub fn cache_over(feed: &ScriptedFeed, ttl: Duration) -> Arc<SnapshotCache> {
    let fetcher = InstrumentFetcher::new(Arc::new(feed.clone()), Duration::from_secs(1), 20);
    let assembler = SnapshotAssembler::new(fetcher, &gold_silver_config());
    Arc::new(SnapshotCache::new(assembler, ttl))
}
