//! Monitor configuration types.

use serde::{Deserialize, Serialize};

use crate::types::Unit;

/// Top-level monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Max age of a cached snapshot before it is refetched.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Period of the scheduled alert loop.
    #[serde(default = "default_alert_interval")]
    pub alert_interval_secs: u64,

    /// Delay before the first scheduled alert after start-up.
    #[serde(default = "default_alert_first_delay")]
    pub alert_first_delay_secs: u64,

    /// Number of points kept per instrument window.
    #[serde(default = "default_window_len")]
    pub window_len: usize,

    /// Upstream price feed settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Instruments to monitor, in display order.
    #[serde(default = "default_instruments")]
    pub instruments: Vec<InstrumentConfig>,

    /// Instrument pairs to derive spread signals for.
    #[serde(default = "default_pairs")]
    pub pairs: Vec<PairConfig>,

    /// Weighted factors feeding the composite risk score.
    #[serde(default = "default_risk_factors")]
    pub risk_factors: Vec<RiskFactorConfig>,

    /// Subscribers with alerts enabled at start-up.
    #[serde(default)]
    pub alert_subscribers: Vec<String>,
}

/// Upstream chart feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_base_url")]
    pub base_url: String,
    /// Chart range requested per instrument (e.g. "1mo").
    #[serde(default = "default_feed_range")]
    pub range: String,
    /// Bar interval (e.g. "1d").
    #[serde(default = "default_feed_interval")]
    pub interval: String,
    /// Per-instrument request timeout.
    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_requests_per_sec")]
    pub requests_per_sec: u32,
}

/// One tracked instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Stable key used by pairs and risk factors (e.g. "gold").
    pub id: String,
    /// Feed symbol (e.g. "GC=F").
    pub symbol: String,
    /// Display name.
    pub name: String,
    #[serde(default)]
    pub unit: Unit,
    /// Shown in the condensed summary report.
    #[serde(default)]
    pub headline: bool,
}

/// How a pair's spread statistic is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpreadMethod {
    /// Z-score of the latest A/B ratio against the window's ratios.
    ZScore,
    /// Latest A/B ratio minus a fixed center.
    Ratio { center: f64 },
    /// Day change of A minus day change of B, in percentage points.
    ReturnGap,
    /// Latest price of A minus a fixed center. Reads leg A only, for quotes
    /// that already are a pair (USD/JPY) or a stocks-vs-bonds gauge (VIX).
    Level { center: f64 },
}

impl SpreadMethod {
    pub fn is_single_leg(&self) -> bool {
        matches!(self, SpreadMethod::Level { .. })
    }
}

/// A configured spread signal over one or two instruments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    pub name: String,
    pub leg_a: String,
    /// Absent for single-leg methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leg_b: Option<String>,
    pub method: SpreadMethod,
    /// Statistic above this leaves neutral.
    pub mild: f64,
    /// Statistic above this is a strong signal.
    pub strong: f64,
    /// Thresholds below zero, as positive distances. Mirror `mild` and
    /// `strong` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_mild: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_strong: Option<f64>,
}

impl PairConfig {
    /// Two-leg pair with symmetric bands.
    pub fn spread(
        name: &str,
        leg_a: &str,
        leg_b: &str,
        method: SpreadMethod,
        mild: f64,
        strong: f64,
    ) -> Self {
        Self {
            name: name.into(),
            leg_a: leg_a.into(),
            leg_b: Some(leg_b.into()),
            method,
            mild,
            strong,
            short_mild: None,
            short_strong: None,
        }
    }

    /// Instrument ids this signal reads.
    pub fn legs(&self) -> Vec<&str> {
        std::iter::once(self.leg_a.as_str())
            .chain(self.leg_b.as_deref())
            .collect()
    }

    /// `(mild, strong)` distances below zero.
    pub fn short_bands(&self) -> (f64, f64) {
        (
            self.short_mild.unwrap_or(self.mild),
            self.short_strong.unwrap_or(self.strong),
        )
    }
}

/// Which direction of a move counts as stress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Up,
    Down,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FactorKind {
    /// Day change normalized by `scale_pct`.
    Move {
        instrument: String,
        direction: MoveDirection,
        scale_pct: f64,
    },
    /// Latest price placed between `low` and `high`.
    Level {
        instrument: String,
        low: f64,
        high: f64,
    },
    /// Realized volatility of window returns normalized by `scale_pct`.
    Volatility { instrument: String, scale_pct: f64 },
    /// Gap between two instruments' day changes normalized by `scale_pct`.
    Divergence { a: String, b: String, scale_pct: f64 },
}

impl FactorKind {
    /// Instrument ids this factor reads.
    pub fn instruments(&self) -> Vec<&str> {
        match self {
            FactorKind::Move { instrument, .. }
            | FactorKind::Level { instrument, .. }
            | FactorKind::Volatility { instrument, .. } => vec![instrument.as_str()],
            FactorKind::Divergence { a, b, .. } => vec![a.as_str(), b.as_str()],
        }
    }
}

/// One weighted input to the risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactorConfig {
    pub label: String,
    pub weight: f64,
    pub kind: FactorKind,
}

impl MonitorConfig {
    pub fn instrument(&self, id: &str) -> Option<&InstrumentConfig> {
        self.instruments.iter().find(|i| i.id == id)
    }
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_cache_ttl() -> u64 {
    60
}
fn default_alert_interval() -> u64 {
    3600
}
fn default_alert_first_delay() -> u64 {
    10
}
fn default_window_len() -> usize {
    20
}
fn default_feed_base_url() -> String {
    "https://query1.finance.yahoo.com".into()
}
fn default_feed_range() -> String {
    "1mo".into()
}
fn default_feed_interval() -> String {
    "1d".into()
}
fn default_feed_timeout() -> u64 {
    10
}
fn default_requests_per_sec() -> u32 {
    5
}

fn instrument(id: &str, symbol: &str, name: &str, unit: Unit, headline: bool) -> InstrumentConfig {
    InstrumentConfig {
        id: id.into(),
        symbol: symbol.into(),
        name: name.into(),
        unit,
        headline,
    }
}

fn default_instruments() -> Vec<InstrumentConfig> {
    vec![
        instrument("gold", "GC=F", "Gold", Unit::Currency, true),
        instrument("silver", "SI=F", "Silver", Unit::Currency, false),
        instrument("copper", "HG=F", "Copper", Unit::Currency, false),
        instrument("dxy", "DX-Y.NYB", "US Dollar Index", Unit::Points, true),
        instrument("us10y", "^TNX", "US 10Y Treasury", Unit::Percentage, false),
        instrument("btc", "BTC-USD", "Bitcoin", Unit::Currency, true),
        instrument("krwjpy", "KRWJPY=X", "KRW/JPY", Unit::Currency, false),
        instrument("krwusd", "KRW=X", "USD/KRW", Unit::Currency, true),
        instrument("usdjpy", "JPY=X", "USD/JPY", Unit::Currency, false),
        instrument("spx", "^GSPC", "S&P 500", Unit::Points, true),
        instrument("ndx", "^NDX", "NASDAQ 100", Unit::Points, true),
        instrument("vix", "^VIX", "VIX", Unit::Points, true),
    ]
}

fn default_pairs() -> Vec<PairConfig> {
    vec![
        PairConfig::spread(
            "Gold/Silver",
            "gold",
            "silver",
            SpreadMethod::Ratio { center: 75.0 },
            7.0,
            15.0,
        ),
        PairConfig::spread("NASDAQ/S&P", "ndx", "spx", SpreadMethod::ReturnGap, 1.5, 3.0),
        PairConfig::spread("Copper/Gold", "copper", "gold", SpreadMethod::ZScore, 1.0, 2.0),
        // Long above 25 / 35, short below 15 / 12.
        PairConfig {
            name: "Bonds/Stocks (VIX)".into(),
            leg_a: "vix".into(),
            leg_b: None,
            method: SpreadMethod::Level { center: 20.0 },
            mild: 5.0,
            strong: 15.0,
            short_mild: Some(5.0),
            short_strong: Some(8.0),
        },
        // Long above 152 / 160, short below 142 / 135.
        PairConfig {
            name: "USD/JPY carry".into(),
            leg_a: "usdjpy".into(),
            leg_b: None,
            method: SpreadMethod::Level { center: 147.0 },
            mild: 5.0,
            strong: 13.0,
            short_mild: Some(5.0),
            short_strong: Some(12.0),
        },
    ]
}

fn move_factor(label: &str, weight: f64, id: &str, direction: MoveDirection, scale_pct: f64) -> RiskFactorConfig {
    RiskFactorConfig {
        label: label.into(),
        weight,
        kind: FactorKind::Move {
            instrument: id.into(),
            direction,
            scale_pct,
        },
    }
}

fn default_risk_factors() -> Vec<RiskFactorConfig> {
    vec![
        move_factor("S&P 500 drawdown", 3.0, "spx", MoveDirection::Down, 3.0),
        move_factor("NASDAQ 100 drawdown", 3.0, "ndx", MoveDirection::Down, 3.0),
        RiskFactorConfig {
            label: "S&P/NASDAQ divergence".into(),
            weight: 2.0,
            kind: FactorKind::Divergence {
                a: "spx".into(),
                b: "ndx".into(),
                scale_pct: 2.0,
            },
        },
        RiskFactorConfig {
            label: "VIX level".into(),
            weight: 3.0,
            kind: FactorKind::Level {
                instrument: "vix".into(),
                low: 15.0,
                high: 35.0,
            },
        },
        move_factor("Dollar index surge", 2.0, "dxy", MoveDirection::Up, 1.0),
        RiskFactorConfig {
            label: "Dollar strength".into(),
            weight: 2.0,
            kind: FactorKind::Level {
                instrument: "dxy".into(),
                low: 100.0,
                high: 110.0,
            },
        },
        move_factor("Won volatility vs dollar", 3.0, "krwusd", MoveDirection::Both, 2.0),
        move_factor("Yen carry stress", 3.0, "usdjpy", MoveDirection::Both, 2.0),
        move_factor("Won weakness vs yen", 2.0, "krwjpy", MoveDirection::Down, 2.0),
        move_factor("US 10Y swing", 2.0, "us10y", MoveDirection::Both, 5.0),
        move_factor("Gold bid", 2.0, "gold", MoveDirection::Up, 2.0),
        move_factor("Silver bid", 2.0, "silver", MoveDirection::Up, 3.0),
        move_factor("Copper swing", 2.0, "copper", MoveDirection::Both, 3.0),
        move_factor("Bitcoin rally", 2.0, "btc", MoveDirection::Up, 6.0),
        RiskFactorConfig {
            label: "S&P 500 realized volatility".into(),
            weight: 1.0,
            kind: FactorKind::Volatility {
                instrument: "spx".into(),
                scale_pct: 2.5,
            },
        },
    ]
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            alert_interval_secs: default_alert_interval(),
            alert_first_delay_secs: default_alert_first_delay(),
            window_len: default_window_len(),
            feed: FeedConfig::default(),
            instruments: default_instruments(),
            pairs: default_pairs(),
            risk_factors: default_risk_factors(),
            alert_subscribers: Vec::new(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_base_url(),
            range: default_feed_range(),
            interval: default_feed_interval(),
            timeout_secs: default_feed_timeout(),
            requests_per_sec: default_requests_per_sec(),
        }
    }
}
