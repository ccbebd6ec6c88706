//! Composite risk score.
//!
//! Each configured factor maps one or two instruments to a signal in
//! `[0, 1]`. The score is the weight-averaged signal scaled to
//! `[SCORE_MIN, SCORE_MAX]`. Factors whose inputs are unavailable drop
//! out and the remaining weights are renormalized, so partial data still
//! yields a defined score.

use std::collections::HashMap;

use common::config::{FactorKind, MoveDirection, RiskFactorConfig};
use common::Instrument;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;
/// Scores at or above this are at least medium.
pub const MEDIUM_THRESHOLD: f64 = 30.0;
/// Scores at or above this are high.
pub const HIGH_THRESHOLD: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_THRESHOLD {
            RiskBand::High
        } else if score >= MEDIUM_THRESHOLD {
            RiskBand::Medium
        } else {
            RiskBand::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskBand::Low => "LOW",
            RiskBand::Medium => "MEDIUM",
            RiskBand::High => "HIGH",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskBand::Low => "🟢",
            RiskBand::Medium => "🟡",
            RiskBand::High => "🔴",
        }
    }
}

/// One factor's share of the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub label: String,
    /// Raw signal in `[0, 1]`.
    pub signal: f64,
    /// Weight after renormalization over available factors.
    pub weight: f64,
    /// Points added to the score.
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub value: f64,
    pub band: RiskBand,
    /// Non-zero contributors, largest first.
    pub factors: Vec<RiskFactor>,
    /// Fraction of configured weight that could be computed.
    pub coverage: f64,
}

impl RiskScore {
    fn empty() -> Self {
        Self {
            value: SCORE_MIN,
            band: RiskBand::from_score(SCORE_MIN),
            factors: Vec::new(),
            coverage: 0.0,
        }
    }
}

/// Stateless scorer over a fixed factor set.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    factors: Vec<RiskFactorConfig>,
}

impl RiskScorer {
    pub fn new(factors: Vec<RiskFactorConfig>) -> Self {
        Self { factors }
    }

    pub fn score(&self, instruments: &[Instrument]) -> RiskScore {
        let by_id: HashMap<&str, &Instrument> =
            instruments.iter().map(|i| (i.id.as_str(), i)).collect();

        let total_weight: f64 = self.factors.iter().map(|f| f.weight.max(0.0)).sum();

        let computed: Vec<(&RiskFactorConfig, f64)> = self
            .factors
            .iter()
            .filter(|f| f.weight > 0.0)
            .filter_map(|f| match factor_signal(&f.kind, &by_id) {
                Some(s) => Some((f, s)),
                None => {
                    debug!("Risk factor '{}' skipped: inputs unavailable", f.label);
                    None
                }
            })
            .collect();

        let available_weight: f64 = computed.iter().map(|(f, _)| f.weight).sum();
        if available_weight <= 0.0 {
            return RiskScore::empty();
        }

        let mut factors: Vec<RiskFactor> = computed
            .iter()
            .map(|(f, signal)| {
                let weight = f.weight / available_weight;
                RiskFactor {
                    label: f.label.clone(),
                    signal: *signal,
                    weight,
                    contribution: SCORE_MAX * weight * signal,
                }
            })
            .collect();

        let raw: f64 = factors.iter().map(|f| f.contribution).sum();
        let value = raw.clamp(SCORE_MIN, SCORE_MAX);

        factors.retain(|f| f.contribution > 0.0);
        // Stable sort keeps config order among equal contributions.
        factors.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));

        RiskScore {
            value,
            band: RiskBand::from_score(value),
            factors,
            coverage: if total_weight > 0.0 {
                available_weight / total_weight
            } else {
                0.0
            },
        }
    }
}

fn capped_ratio(value: f64, scale: f64) -> Option<f64> {
    if scale <= 0.0 || !value.is_finite() {
        return None;
    }
    Some((value / scale).clamp(0.0, 1.0))
}

fn population_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Signal in `[0, 1]`, or `None` when an input is unavailable.
fn factor_signal(kind: &FactorKind, by_id: &HashMap<&str, &Instrument>) -> Option<f64> {
    match kind {
        FactorKind::Move {
            instrument,
            direction,
            scale_pct,
        } => {
            let chg = by_id.get(instrument.as_str())?.change_pct()?;
            let directional = match direction {
                MoveDirection::Up => chg.max(0.0),
                MoveDirection::Down => (-chg).max(0.0),
                MoveDirection::Both => chg.abs(),
            };
            capped_ratio(directional, *scale_pct)
        }
        FactorKind::Level {
            instrument,
            low,
            high,
        } => {
            let price = by_id.get(instrument.as_str())?.price()?;
            capped_ratio(price - low, high - low)
        }
        FactorKind::Volatility {
            instrument,
            scale_pct,
        } => {
            let returns = by_id.get(instrument.as_str())?.window()?.returns_pct();
            if returns.len() < 2 {
                return None;
            }
            capped_ratio(population_std(&returns), *scale_pct)
        }
        FactorKind::Divergence { a, b, scale_pct } => {
            let chg_a = by_id.get(a.as_str())?.change_pct()?;
            let chg_b = by_id.get(b.as_str())?.change_pct()?;
            capped_ratio((chg_a - chg_b).abs(), *scale_pct)
        }
    }
}
