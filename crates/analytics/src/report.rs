//! Plain-text replies rendered from a snapshot.
//!
//! Every function here is pure: same snapshot in, same text out.

use std::fmt::Write as _;

use common::{Instrument, Trend};

use crate::pairs::PairSignal;
use crate::snapshot::MarketSnapshot;

/// Factors shown in the summary before collapsing into "+N more".
pub const SUMMARY_TOP_FACTORS: usize = 5;

/// Minimum absolute day change for an instrument to appear in alerts.
pub const ALERT_MOVER_PCT: f64 = 1.0;

fn arrow(change_pct: f64) -> &'static str {
    if change_pct > 0.0 {
        "🔼"
    } else if change_pct < 0.0 {
        "🔽"
    } else {
        "▫"
    }
}

fn trend_icon(trend: Option<Trend>) -> &'static str {
    match trend {
        Some(Trend::Rising) => "🟢",
        Some(Trend::Falling) => "🔴",
        _ => "⚪",
    }
}

fn timestamp_line(snapshot: &MarketSnapshot) -> String {
    format!("🕒 {}", snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"))
}

fn instrument_change(inst: &Instrument) -> String {
    match inst.change_pct() {
        Some(chg) => format!("{} {:+.2}%", arrow(chg), chg),
        None => "▫ n/a".to_string(),
    }
}

fn pair_line(pair: &PairSignal) -> String {
    match pair.reading.value() {
        Some(r) => match r.ratio {
            Some(ratio) => format!(
                "{} {} (stat {:+.2}, ratio {:.4})",
                r.stage.emoji(),
                r.stage.label(),
                r.statistic,
                ratio
            ),
            None => format!("{} {} (stat {:+.2})", r.stage.emoji(), r.stage.label(), r.statistic),
        },
        None => "⚪ unavailable".to_string(),
    }
}

fn risk_headline(snapshot: &MarketSnapshot) -> String {
    let risk = &snapshot.risk;
    format!(
        "{} Level: {} (score {:.1})",
        risk.band.emoji(),
        risk.band.label(),
        risk.value
    )
}

pub fn risk(snapshot: &MarketSnapshot) -> String {
    let risk = &snapshot.risk;
    let mut out = String::new();
    let _ = writeln!(out, "🚨 Risk signal\n");
    let _ = writeln!(out, "{}", risk_headline(snapshot));
    if risk.coverage < 1.0 {
        let _ = writeln!(out, "Coverage: {:.0}% of factor weight", risk.coverage * 100.0);
    }
    let _ = writeln!(out);

    if risk.factors.is_empty() {
        let _ = writeln!(out, "No active factors");
    } else {
        let _ = writeln!(out, "Contributing factors:");
        for f in &risk.factors {
            let _ = writeln!(out, "  • {} +{:.1}", f.label, f.contribution);
        }
    }

    let _ = write!(out, "\n{}", timestamp_line(snapshot));
    out
}

pub fn market(snapshot: &MarketSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "📈 Market overview\n");
    for inst in &snapshot.instruments {
        let _ = writeln!(
            out,
            "{} {}\n   {} {}",
            trend_icon(inst.trend()),
            inst.name,
            inst.formatted_value(),
            instrument_change(inst)
        );
    }
    let _ = write!(out, "\n{}", timestamp_line(snapshot));
    out
}

pub fn pairs(snapshot: &MarketSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "💱 Pair signals (5 stages)\n");
    if snapshot.pairs.is_empty() {
        let _ = writeln!(out, "No pairs configured\n");
    }
    for pair in &snapshot.pairs {
        let _ = writeln!(out, "💡 {}\n   {}\n", pair.name, pair_line(pair));
    }
    let _ = write!(out, "{}", timestamp_line(snapshot));
    out
}

/// Condensed report: top factors, headline instruments, every pair.
pub fn summary(snapshot: &MarketSnapshot, headline: &[String]) -> String {
    let risk = &snapshot.risk;
    let mut out = String::new();
    let _ = writeln!(out, "📋 Market summary\n{}\n", "=".repeat(30));

    let _ = writeln!(out, "🚨 Risk signal");
    let _ = writeln!(out, "{}", risk_headline(snapshot));
    for f in risk.factors.iter().take(SUMMARY_TOP_FACTORS) {
        let _ = writeln!(out, "  • {} +{:.1}", f.label, f.contribution);
    }
    if risk.factors.len() > SUMMARY_TOP_FACTORS {
        let _ = writeln!(out, "  +{} more", risk.factors.len() - SUMMARY_TOP_FACTORS);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "📈 Key instruments");
    for inst in snapshot
        .instruments
        .iter()
        .filter(|i| headline.iter().any(|h| h == &i.id))
    {
        let _ = writeln!(
            out,
            "  {}: {} {}",
            inst.name,
            inst.formatted_value(),
            instrument_change(inst)
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "💱 Pair signals");
    for pair in &snapshot.pairs {
        let _ = writeln!(out, "  {}: {}", pair.name, pair_line(pair));
    }

    let _ = write!(out, "\n{}", timestamp_line(snapshot));
    out
}

/// Scheduled alert body: band, notable movers, active pairs.
pub fn alert(snapshot: &MarketSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "⏰ Scheduled market alert\n");
    let _ = writeln!(out, "🚨 Risk: {}\n", risk_headline(snapshot));

    let movers: Vec<(&Instrument, f64)> = snapshot
        .instruments
        .iter()
        .filter_map(|i| i.change_pct().map(|c| (i, c)))
        .filter(|(_, c)| c.abs() >= ALERT_MOVER_PCT)
        .collect();
    if !movers.is_empty() {
        let _ = writeln!(out, "Notable moves:");
        for (inst, chg) in movers {
            let _ = writeln!(out, "  {} {}: {:+.2}%", arrow(chg), inst.name, chg);
        }
        let _ = writeln!(out);
    }

    let active: Vec<&PairSignal> = snapshot
        .pairs
        .iter()
        .filter(|p| p.stage().is_some_and(|s| !s.is_neutral()))
        .collect();
    if !active.is_empty() {
        let _ = writeln!(out, "Active signals:");
        for pair in active {
            let _ = writeln!(out, "  {}: {}", pair.name, pair_line(pair));
        }
        let _ = writeln!(out);
    }

    let _ = write!(out, "{}", timestamp_line(snapshot));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::{PairReading, SpreadStage};
    use crate::risk::{RiskBand, RiskFactor, RiskScore};
    use chrono::{Duration, TimeZone, Utc};
    use common::config::SpreadMethod;
    use common::{Availability, PricePoint, PriceWindow, Unit};

    fn instrument(id: &str, name: &str, prices: &[f64]) -> Instrument {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let points = prices.iter().enumerate().map(|(i, p)| PricePoint {
            timestamp: start + Duration::days(i as i64),
            price: *p,
        });
        Instrument {
            id: id.into(),
            symbol: id.into(),
            name: name.into(),
            unit: Unit::Currency,
            data: Availability::Available(PriceWindow::from_points(20, points)),
        }
    }

    fn factor(label: &str, contribution: f64) -> RiskFactor {
        RiskFactor {
            label: label.into(),
            signal: 1.0,
            weight: contribution / 100.0,
            contribution,
        }
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            fetched_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            instruments: vec![
                instrument("gold", "Gold", &[100.0, 103.0]),
                instrument("spx", "S&P 500", &[5000.0, 5001.0]),
                Instrument {
                    id: "silver".into(),
                    symbol: "SI=F".into(),
                    name: "Silver".into(),
                    unit: Unit::Currency,
                    data: Availability::unavailable("timeout"),
                },
            ],
            risk: RiskScore {
                value: 42.0,
                band: RiskBand::Medium,
                factors: (0..7).map(|i| factor(&format!("f{}", i), 7.0 - i as f64)).collect(),
                coverage: 0.8,
            },
            pairs: vec![
                PairSignal {
                    name: "Gold/Silver".into(),
                    leg_a: "gold".into(),
                    leg_b: Some("silver".into()),
                    method: SpreadMethod::ZScore,
                    reading: Availability::unavailable("silver unavailable"),
                },
                PairSignal {
                    name: "NASDAQ/S&P".into(),
                    leg_a: "ndx".into(),
                    leg_b: Some("spx".into()),
                    method: SpreadMethod::ReturnGap,
                    reading: Availability::Available(PairReading {
                        statistic: 2.0,
                        ratio: Some(3.5),
                        stage: SpreadStage::MildLong,
                    }),
                },
                PairSignal {
                    name: "USD/JPY carry".into(),
                    leg_a: "usdjpy".into(),
                    leg_b: None,
                    method: SpreadMethod::Level { center: 147.0 },
                    reading: Availability::Available(PairReading {
                        statistic: -1.25,
                        ratio: None,
                        stage: SpreadStage::Neutral,
                    }),
                },
            ],
        }
    }

    #[test]
    fn test_summary_collapses_extra_factors() {
        let text = summary(&snapshot(), &["gold".to_string()]);
        assert!(text.contains("f4 +3.0"));
        assert!(!text.contains("f5 +2.0"));
        assert!(text.contains("+2 more"));
        assert!(text.contains("Gold: $103.00 🔼 +3.00%"));
        assert!(!text.contains("S&P 500:"));
        assert!(text.contains("Gold/Silver: ⚪ unavailable"));
    }

    #[test]
    fn test_market_marks_unavailable_instruments() {
        let text = market(&snapshot());
        assert!(text.contains("Silver\n   N/A ▫ n/a"));
        assert!(text.contains("🟢 Gold"));
        assert!(text.contains("⚪ S&P 500"));
        assert!(text.contains("2024-03-01 09:30:00 UTC"));
    }

    #[test]
    fn test_alert_lists_movers_and_active_pairs_only() {
        let text = alert(&snapshot());
        assert!(text.contains("MEDIUM"));
        assert!(text.contains("🔼 Gold: +3.00%"));
        assert!(!text.contains("S&P 500:"));
        assert!(text.contains("NASDAQ/S&P: 🟢 mild long spread"));
        assert!(!text.contains("Gold/Silver"));
    }

    #[test]
    fn test_risk_without_factors() {
        let mut snap = snapshot();
        snap.risk = RiskScore {
            value: 0.0,
            band: RiskBand::Low,
            factors: Vec::new(),
            coverage: 1.0,
        };
        let text = risk(&snap);
        assert!(text.contains("LOW"));
        assert!(text.contains("No active factors"));
        assert!(!text.contains("Coverage"));
    }

    #[test]
    fn test_pairs_omit_ratio_for_single_leg_signals() {
        let text = pairs(&snapshot());
        assert!(text.contains("USD/JPY carry\n   🟡 neutral (stat -1.25)\n"));
        assert!(text.contains("🟢 mild long spread (stat +2.00, ratio 3.5000)"));
    }
}
