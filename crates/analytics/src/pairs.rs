//! Pair spread signals.
//!
//! For each configured pair a spread statistic is derived from the legs'
//! windows and placed into one of five stages using threshold bands,
//! symmetric unless the pair overrides its short side. A pair with a
//! missing leg is reported as unavailable.

use std::collections::HashMap;

use chrono::NaiveDate;
use common::config::{PairConfig, SpreadMethod};
use common::{Availability, Instrument, PriceWindow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stages ordered by the spread statistic, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadStage {
    StrongShort,
    MildShort,
    Neutral,
    MildLong,
    StrongLong,
}

impl SpreadStage {
    /// Plain threshold bands, no hysteresis.
    pub fn classify(statistic: f64, mild: f64, strong: f64) -> Self {
        Self::classify_split(statistic, (mild, strong), (mild, strong))
    }

    /// Separate `(mild, strong)` distances above and below zero.
    pub fn classify_split(statistic: f64, long: (f64, f64), short: (f64, f64)) -> Self {
        if statistic > long.1 {
            SpreadStage::StrongLong
        } else if statistic > long.0 {
            SpreadStage::MildLong
        } else if statistic < -short.1 {
            SpreadStage::StrongShort
        } else if statistic < -short.0 {
            SpreadStage::MildShort
        } else {
            SpreadStage::Neutral
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == SpreadStage::Neutral
    }

    pub fn label(&self) -> &'static str {
        match self {
            SpreadStage::StrongShort => "strong short spread",
            SpreadStage::MildShort => "mild short spread",
            SpreadStage::Neutral => "neutral",
            SpreadStage::MildLong => "mild long spread",
            SpreadStage::StrongLong => "strong long spread",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            SpreadStage::StrongShort => "🔴🔴",
            SpreadStage::MildShort => "🔴",
            SpreadStage::Neutral => "🟡",
            SpreadStage::MildLong => "🟢",
            SpreadStage::StrongLong => "🟢🟢",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairReading {
    pub statistic: f64,
    /// Latest leg A / leg B price ratio; `None` for single-leg signals.
    pub ratio: Option<f64>,
    pub stage: SpreadStage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSignal {
    pub name: String,
    pub leg_a: String,
    pub leg_b: Option<String>,
    pub method: SpreadMethod,
    pub reading: Availability<PairReading>,
}

impl PairSignal {
    pub fn stage(&self) -> Option<SpreadStage> {
        self.reading.value().map(|r| r.stage)
    }
}

#[derive(Debug, Clone)]
pub struct PairSignalEngine {
    pairs: Vec<PairConfig>,
}

impl PairSignalEngine {
    pub fn new(pairs: Vec<PairConfig>) -> Self {
        Self { pairs }
    }

    pub fn evaluate(&self, instruments: &[Instrument]) -> Vec<PairSignal> {
        let by_id: HashMap<&str, &Instrument> =
            instruments.iter().map(|i| (i.id.as_str(), i)).collect();

        self.pairs
            .iter()
            .map(|pair| PairSignal {
                name: pair.name.clone(),
                leg_a: pair.leg_a.clone(),
                leg_b: pair.leg_b.clone(),
                method: pair.method,
                reading: read_pair(pair, &by_id),
            })
            .collect()
    }
}

fn leg<'a>(by_id: &HashMap<&str, &'a Instrument>, id: &str) -> Result<&'a PriceWindow, String> {
    match by_id.get(id) {
        Some(inst) => inst.window().ok_or_else(|| format!("{} unavailable", id)),
        None => Err(format!("{} not tracked", id)),
    }
}

fn read_pair(pair: &PairConfig, by_id: &HashMap<&str, &Instrument>) -> Availability<PairReading> {
    let legs = leg(by_id, &pair.leg_a).and_then(|a| {
        let b = pair.leg_b.as_deref().map(|id| leg(by_id, id)).transpose()?;
        Ok((a, b))
    });
    let (a, b) = match legs {
        Ok(legs) => legs,
        Err(reason) => {
            debug!("{}: {}", pair.name, reason);
            return Availability::Unavailable(reason);
        }
    };
    if b.is_none() && !pair.method.is_single_leg() {
        return Availability::unavailable("leg B not configured");
    }

    let ratio = match b {
        Some(b) => match (a.latest(), b.latest()) {
            (Some(pa), Some(pb)) if pb.price > 0.0 => Some(pa.price / pb.price),
            _ => return Availability::unavailable("missing latest price"),
        },
        None => None,
    };

    let statistic = match spread_statistic(pair.method, a, b) {
        Some(s) => s,
        None => return Availability::unavailable("insufficient history"),
    };

    Availability::Available(PairReading {
        statistic,
        ratio,
        stage: SpreadStage::classify_split(
            statistic,
            (pair.mild, pair.strong),
            pair.short_bands(),
        ),
    })
}

/// Spread statistic for one pair, or `None` when history is too short or a
/// two-leg method has no leg B.
pub fn spread_statistic(
    method: SpreadMethod,
    a: &PriceWindow,
    b: Option<&PriceWindow>,
) -> Option<f64> {
    match method {
        SpreadMethod::ZScore => ratio_z_score(&aligned_ratios(a, b?)),
        SpreadMethod::Ratio { center } => {
            let pa = a.latest()?.price;
            let pb = b?.latest()?.price;
            (pb > 0.0).then(|| pa / pb - center)
        }
        SpreadMethod::ReturnGap => Some(a.change_pct()? - b?.change_pct()?),
        SpreadMethod::Level { center } => Some(a.latest()?.price - center),
    }
}

/// A/B ratios on the calendar days both legs traded, oldest first.
fn aligned_ratios(a: &PriceWindow, b: &PriceWindow) -> Vec<f64> {
    let b_by_day: HashMap<NaiveDate, f64> = b
        .points()
        .map(|p| (p.timestamp.date_naive(), p.price))
        .collect();

    a.points()
        .filter_map(|pa| {
            let pb = *b_by_day.get(&pa.timestamp.date_naive())?;
            (pb > 0.0).then(|| pa.price / pb)
        })
        .collect()
}

fn ratio_z_score(ratios: &[f64]) -> Option<f64> {
    if ratios.len() < 2 {
        return None;
    }
    let latest = *ratios.last()?;
    let n = ratios.len() as f64;
    let mean = ratios.iter().sum::<f64>() / n;
    let std = (ratios.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();

    // A flat ratio has no spread to speak of.
    if std <= 1e-12 * mean.abs().max(1.0) {
        return Some(0.0);
    }
    Some((latest - mean) / std)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use common::{MonitorConfig, PricePoint, Unit};

    fn instrument(id: &str, prices: &[f64]) -> Instrument {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let points = prices.iter().enumerate().map(|(i, p)| PricePoint {
            timestamp: start + Duration::days(i as i64),
            price: *p,
        });
        Instrument {
            id: id.into(),
            symbol: id.into(),
            name: id.into(),
            unit: Unit::Currency,
            data: Availability::Available(PriceWindow::from_points(20, points)),
        }
    }

    fn zscore_pair() -> PairConfig {
        PairConfig::spread("Gold/Silver", "GOLD", "SILVER", SpreadMethod::ZScore, 1.0, 2.0)
    }

    #[test]
    fn test_classification_is_monotonic() {
        let mut previous = SpreadStage::StrongShort;
        let mut stat = -5.0;
        while stat <= 5.0 {
            let stage = SpreadStage::classify(stat, 1.0, 2.0);
            assert!(stage >= previous, "stage moved backward at {}", stat);
            previous = stage;
            stat += 0.01;
        }
        assert_eq!(previous, SpreadStage::StrongLong);
    }

    #[test]
    fn test_bands_are_symmetric_and_strict() {
        assert_eq!(SpreadStage::classify(1.0, 1.0, 2.0), SpreadStage::Neutral);
        assert_eq!(SpreadStage::classify(-1.0, 1.0, 2.0), SpreadStage::Neutral);
        assert_eq!(SpreadStage::classify(1.5, 1.0, 2.0), SpreadStage::MildLong);
        assert_eq!(SpreadStage::classify(-1.5, 1.0, 2.0), SpreadStage::MildShort);
        assert_eq!(SpreadStage::classify(2.5, 1.0, 2.0), SpreadStage::StrongLong);
        assert_eq!(SpreadStage::classify(-2.5, 1.0, 2.0), SpreadStage::StrongShort);
    }

    #[test]
    fn test_rising_ratio_moves_toward_long() {
        let engine = PairSignalEngine::new(vec![zscore_pair()]);

        let flat = engine.evaluate(&[
            instrument("GOLD", &[100.0, 101.0, 99.0, 105.0]),
            instrument("SILVER", &[20.0, 20.2, 19.8, 21.0]),
        ]);
        let rising = engine.evaluate(&[
            instrument("GOLD", &[100.0, 101.0, 103.0, 110.0]),
            instrument("SILVER", &[20.0, 19.5, 19.0, 18.0]),
        ]);

        let flat_stage = flat[0].stage().unwrap();
        let rising_stage = rising[0].stage().unwrap();
        assert_eq!(flat_stage, SpreadStage::Neutral);
        assert!(rising_stage > flat_stage);
        assert_eq!(rising_stage, SpreadStage::MildLong);
    }

    #[test]
    fn test_missing_leg_is_unavailable() {
        let engine = PairSignalEngine::new(vec![zscore_pair()]);
        let silver_down = Instrument {
            id: "SILVER".into(),
            symbol: "SILVER".into(),
            name: "Silver".into(),
            unit: Unit::Currency,
            data: Availability::unavailable("timeout"),
        };
        let signals = engine.evaluate(&[instrument("GOLD", &[100.0, 101.0]), silver_down]);
        assert_eq!(signals.len(), 1);
        assert!(!signals[0].reading.is_available());
        assert_eq!(signals[0].stage(), None);
    }

    #[test]
    fn test_ratio_method_matches_fixed_bands() {
        let pair = PairConfig::spread(
            "Gold/Silver",
            "gold",
            "silver",
            SpreadMethod::Ratio { center: 75.0 },
            7.0,
            15.0,
        );
        let engine = PairSignalEngine::new(vec![pair]);
        let stage_at = |gold: f64| {
            engine.evaluate(&[instrument("gold", &[gold]), instrument("silver", &[1.0])])[0]
                .stage()
                .unwrap()
        };
        assert_eq!(stage_at(95.0), SpreadStage::StrongLong);
        assert_eq!(stage_at(85.0), SpreadStage::MildLong);
        assert_eq!(stage_at(75.0), SpreadStage::Neutral);
        assert_eq!(stage_at(65.0), SpreadStage::MildShort);
        assert_eq!(stage_at(55.0), SpreadStage::StrongShort);
    }

    #[test]
    fn test_return_gap_uses_day_changes() {
        let ndx = instrument("ndx", &[100.0, 104.0]);
        let spx = instrument("spx", &[100.0, 101.0]);
        let gap = spread_statistic(SpreadMethod::ReturnGap, ndx.window().unwrap(), spx.window())
            .unwrap();
        assert!((gap - 3.0).abs() < 1e-9);
        assert_eq!(
            spread_statistic(SpreadMethod::ReturnGap, ndx.window().unwrap(), None),
            None
        );
    }

    fn default_level_stage(name: &str, id: &str, price: f64) -> SpreadStage {
        let pairs = MonitorConfig::default()
            .pairs
            .into_iter()
            .filter(|p| p.name == name)
            .collect();
        let signals = PairSignalEngine::new(pairs).evaluate(&[instrument(id, &[price])]);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].reading.value().unwrap().ratio, None);
        signals[0].stage().unwrap()
    }

    #[test]
    fn test_default_vix_signal_bands() {
        let stage = |vix| default_level_stage("Bonds/Stocks (VIX)", "vix", vix);
        assert_eq!(stage(36.0), SpreadStage::StrongLong);
        assert_eq!(stage(35.0), SpreadStage::MildLong);
        assert_eq!(stage(26.0), SpreadStage::MildLong);
        assert_eq!(stage(25.0), SpreadStage::Neutral);
        assert_eq!(stage(15.0), SpreadStage::Neutral);
        assert_eq!(stage(14.0), SpreadStage::MildShort);
        assert_eq!(stage(12.0), SpreadStage::MildShort);
        assert_eq!(stage(11.0), SpreadStage::StrongShort);
    }

    #[test]
    fn test_default_usdjpy_carry_bands() {
        let stage = |px| default_level_stage("USD/JPY carry", "usdjpy", px);
        assert_eq!(stage(161.0), SpreadStage::StrongLong);
        assert_eq!(stage(155.0), SpreadStage::MildLong);
        assert_eq!(stage(147.0), SpreadStage::Neutral);
        assert_eq!(stage(142.0), SpreadStage::Neutral);
        assert_eq!(stage(140.0), SpreadStage::MildShort);
        assert_eq!(stage(134.0), SpreadStage::StrongShort);
    }

    #[test]
    fn test_single_leg_signal_needs_its_instrument() {
        let pairs = MonitorConfig::default()
            .pairs
            .into_iter()
            .filter(|p| p.name == "USD/JPY carry")
            .collect();
        let signals = PairSignalEngine::new(pairs).evaluate(&[instrument("vix", &[20.0])]);
        match &signals[0].reading {
            Availability::Unavailable(reason) => assert_eq!(reason, "usdjpy not tracked"),
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_two_leg_method_without_leg_b_is_unavailable() {
        let mut pair = zscore_pair();
        pair.leg_b = None;
        let signals =
            PairSignalEngine::new(vec![pair]).evaluate(&[instrument("GOLD", &[100.0, 101.0])]);
        assert!(!signals[0].reading.is_available());
    }

    #[test]
    fn test_split_bands_are_strict() {
        let stage = |s| SpreadStage::classify_split(s, (5.0, 15.0), (5.0, 8.0));
        assert_eq!(stage(-8.0), SpreadStage::MildShort);
        assert_eq!(stage(-8.5), SpreadStage::StrongShort);
        assert_eq!(stage(15.0), SpreadStage::MildLong);
        assert_eq!(stage(-5.0), SpreadStage::Neutral);
    }

    #[test]
    fn test_zscore_needs_overlapping_history() {
        let engine = PairSignalEngine::new(vec![zscore_pair()]);
        let signals = engine.evaluate(&[instrument("GOLD", &[100.0]), instrument("SILVER", &[20.0])]);
        match &signals[0].reading {
            Availability::Unavailable(reason) => assert_eq!(reason, "insufficient history"),
            other => panic!("expected unavailable, got {:?}", other),
        }
    }
}
