//! Domain types shared across the monitor.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Availability ──────────────────────────────────────────────────────

/// Explicit marker for data that may be missing.
///
/// Feed failures and missing pair legs travel through the pipeline as
/// `Unavailable` rather than as zero prices or dropped entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Availability<T> {
    Available(T),
    /// Carries a short human-readable reason.
    Unavailable(String),
}

impl<T> Availability<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Availability::Unavailable(reason.into())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Availability::Available(v) => Some(v),
            Availability::Unavailable(_) => None,
        }
    }
}

// ── Price series ──────────────────────────────────────────────────────

/// One observation from the instrument feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Fixed-capacity rolling window of prices, oldest first.
///
/// Pushing into a full window evicts the oldest point, so the length
/// stays at `capacity` once populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceWindow {
    capacity: usize,
    points: VecDeque<PricePoint>,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    /// Build a window from a chronological series, keeping the most recent
    /// `capacity` points.
    pub fn from_points(capacity: usize, points: impl IntoIterator<Item = PricePoint>) -> Self {
        let mut window = Self::new(capacity);
        for p in points {
            window.push(p);
        }
        window
    }

    pub fn push(&mut self, point: PricePoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.points.len() == self.capacity
    }

    pub fn points(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.back()
    }

    pub fn previous(&self) -> Option<&PricePoint> {
        let n = self.points.len();
        if n < 2 {
            None
        } else {
            self.points.get(n - 2)
        }
    }

    /// Percentage change between the last two points.
    pub fn change_pct(&self) -> Option<f64> {
        let latest = self.latest()?.price;
        let previous = self.previous()?.price;
        if previous == 0.0 {
            return None;
        }
        Some((latest - previous) / previous * 100.0)
    }

    /// Point-to-point percentage returns across the whole window.
    pub fn returns_pct(&self) -> Vec<f64> {
        let prices = self.prices();
        prices
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| (w[1] - w[0]) / w[0] * 100.0)
            .collect()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.latest().map(|p| p.timestamp)
    }
}

// ── Instruments ───────────────────────────────────────────────────────

/// How an instrument's value is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    #[default]
    Currency,
    Points,
    Percentage,
}

impl Unit {
    pub fn format(&self, value: f64) -> String {
        match self {
            Unit::Percentage => format!("{:.2}%", value),
            Unit::Points => format!("{:.2}", value),
            Unit::Currency => format!("${}", group_thousands(value)),
        }
    }
}

fn group_thousands(value: f64) -> String {
    let raw = format!("{:.2}", value.abs());
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

/// Day-over-day direction, with moves under 1% treated as steady.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Steady,
    Falling,
}

impl Trend {
    pub const STEADY_BAND_PCT: f64 = 1.0;

    pub fn from_change(change_pct: f64) -> Self {
        if change_pct.abs() < Self::STEADY_BAND_PCT {
            Trend::Steady
        } else if change_pct > 0.0 {
            Trend::Rising
        } else {
            Trend::Falling
        }
    }
}

/// State of one tracked instrument within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub unit: Unit,
    pub data: Availability<PriceWindow>,
}

impl Instrument {
    pub fn window(&self) -> Option<&PriceWindow> {
        self.data.value()
    }

    pub fn is_available(&self) -> bool {
        self.data.is_available()
    }

    pub fn price(&self) -> Option<f64> {
        self.window()?.latest().map(|p| p.price)
    }

    pub fn change_pct(&self) -> Option<f64> {
        self.window()?.change_pct()
    }

    pub fn trend(&self) -> Option<Trend> {
        self.change_pct().map(Trend::from_change)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.window()?.updated_at()
    }

    pub fn formatted_value(&self) -> String {
        match self.price() {
            Some(p) => self.unit.format(p),
            None => "N/A".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(day: u32, price: f64) -> PricePoint {
        PricePoint {
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            price,
        }
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut w = PriceWindow::new(3);
        for (i, p) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            w.push(point(i as u32 + 1, *p));
        }
        assert_eq!(w.len(), 3);
        assert!(w.is_full());
        assert_eq!(w.prices(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_change_pct_requires_two_points() {
        let w = PriceWindow::from_points(5, vec![point(1, 100.0)]);
        assert_eq!(w.change_pct(), None);

        let w = PriceWindow::from_points(5, vec![point(1, 100.0), point(2, 105.0)]);
        let chg = w.change_pct().unwrap();
        assert!((chg - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_unit_formatting() {
        assert_eq!(Unit::Currency.format(1234567.891), "$1,234,567.89");
        assert_eq!(Unit::Currency.format(99.5), "$99.50");
        assert_eq!(Unit::Points.format(4512.3), "4512.30");
        assert_eq!(Unit::Percentage.format(4.256), "4.26%");
    }

    #[test]
    fn test_unavailable_instrument_formats_as_na() {
        let inst = Instrument {
            id: "gold".into(),
            symbol: "GC=F".into(),
            name: "Gold".into(),
            unit: Unit::Currency,
            data: Availability::unavailable("timeout"),
        };
        assert_eq!(inst.price(), None);
        assert_eq!(inst.formatted_value(), "N/A");
        assert_eq!(inst.trend(), None);
    }

    #[test]
    fn test_trend_bands() {
        assert_eq!(Trend::from_change(0.4), Trend::Steady);
        assert_eq!(Trend::from_change(-0.99), Trend::Steady);
        assert_eq!(Trend::from_change(1.2), Trend::Rising);
        assert_eq!(Trend::from_change(-2.0), Trend::Falling);
    }
}
