//! Swing point extraction: local peaks and troughs of a price window.
//!
//! A sample at index `i` is a peak when its price is strictly greater than
//! every other price in `[i - radius, i + radius]`, and a trough under the
//! mirrored condition. Only indices with a full neighbourhood on both sides
//! are eligible, so the newest `radius` samples never produce a swing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Instrument, Timeframe};
use crate::market::MarketData;

/// Peak or trough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingKind {
    Peak,
    Trough,
}

/// A local extremum with the oscillator reading at the same bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub oscillator: f64,
    pub kind: SwingKind,
    /// Bars between this point and the latest sample (0 = latest).
    pub offset: usize,
    /// 1..=strength_ceiling, from the smaller of the left/right price deltas.
    pub strength: u8,
}

/// One input sample for the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingSample {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub oscillator: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingConfig {
    /// Look-around radius in bars.
    pub radius: usize,
    /// Number of recent bars scanned per pass.
    pub window: usize,
    pub strength_ceiling: u8,
    /// Points of clearance per additional strength level.
    pub strength_step_points: f64,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            radius: 3,
            window: 60,
            strength_ceiling: 5,
            strength_step_points: 10.0,
        }
    }
}

/// Extraction result. Both sequences are most-recent-first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwingSet {
    pub peaks: Vec<SwingPoint>,
    pub troughs: Vec<SwingPoint>,
}

impl SwingSet {
    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty() && self.troughs.is_empty()
    }

    /// The latest two peaks as (latest, previous).
    pub fn last_two_peaks(&self) -> Option<(&SwingPoint, &SwingPoint)> {
        match self.peaks.as_slice() {
            [latest, previous, ..] => Some((latest, previous)),
            _ => None,
        }
    }

    /// The latest two troughs as (latest, previous).
    pub fn last_two_troughs(&self) -> Option<(&SwingPoint, &SwingPoint)> {
        match self.troughs.as_slice() {
            [latest, previous, ..] => Some((latest, previous)),
            _ => None,
        }
    }
}

/// Extract peaks and troughs from chronologically ordered samples.
///
/// Fewer than `2 * radius + 1` samples (or a zero radius) yields an empty set.
pub fn extract(samples: &[SwingSample], config: &SwingConfig, instrument: &Instrument) -> SwingSet {
    let n = samples.len();
    let r = config.radius;
    if r == 0 || n < 2 * r + 1 {
        return SwingSet::default();
    }

    let mut set = SwingSet::default();
    // Newest eligible index first so the output is most-recent-first.
    for i in (r..n - r).rev() {
        let centre = samples[i].price;
        if !centre.is_finite() {
            continue;
        }
        let left = &samples[i - r..i];
        let right = &samples[i + 1..=i + r];

        let (left_max, left_min) = bounds(left);
        let (right_max, right_min) = bounds(right);

        let kind = if centre > left_max && centre > right_max {
            SwingKind::Peak
        } else if centre < left_min && centre < right_min {
            SwingKind::Trough
        } else {
            continue;
        };

        let clearance = match kind {
            SwingKind::Peak => (centre - left_max).min(centre - right_max),
            SwingKind::Trough => (left_min - centre).min(right_min - centre),
        };

        let point = SwingPoint {
            timestamp: samples[i].timestamp,
            price: centre,
            oscillator: samples[i].oscillator,
            kind,
            offset: n - 1 - i,
            strength: strength_rating(instrument.to_points(clearance), config),
        };
        match kind {
            SwingKind::Peak => set.peaks.push(point),
            SwingKind::Trough => set.troughs.push(point),
        }
    }
    set
}

/// Build the sample window from a market-data source and extract swings.
///
/// Samples are read back from offset `window - 1` to 0. A gap (missing bar or
/// oscillator value) truncates the window at the gap, keeping only the
/// contiguous recent part.
pub fn extract_from_market(
    market: &dyn MarketData,
    instrument: &Instrument,
    timeframe: Timeframe,
    config: &SwingConfig,
) -> SwingSet {
    let mut recent_first = Vec::with_capacity(config.window);
    for offset in 0..config.window {
        let bar = market.bar(&instrument.symbol, timeframe, offset);
        let osc = market.oscillator(&instrument.symbol, timeframe, offset);
        match (bar, osc) {
            (Some(bar), Some(oscillator)) => recent_first.push(SwingSample {
                timestamp: bar.timestamp,
                price: bar.close,
                oscillator,
            }),
            _ => break,
        }
    }
    recent_first.reverse();
    extract(&recent_first, config, instrument)
}

fn bounds(samples: &[SwingSample]) -> (f64, f64) {
    samples.iter().fold((f64::NEG_INFINITY, f64::INFINITY), |(hi, lo), s| {
        (hi.max(s.price), lo.min(s.price))
    })
}

fn strength_rating(clearance_points: f64, config: &SwingConfig) -> u8 {
    let ceiling = config.strength_ceiling.max(1);
    if config.strength_step_points <= 0.0 || !clearance_points.is_finite() {
        return 1;
    }
    let steps = (clearance_points / config.strength_step_points).floor();
    let rating = 1.0 + steps.max(0.0);
    rating.min(f64::from(ceiling)) as u8
}
