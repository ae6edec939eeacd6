//! Trend-strength classification for the ranging gate.
//!
//! Works on percentage separations of the averages rather than points, with
//! cutoffs stricter than the alignment bands.

use serde::{Deserialize, Serialize};

use crate::domain::MaSnapshot;

use super::settings::ValidationSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendStrength {
    Strong,
    Moderate,
    Weak,
    Neutral,
}

impl std::fmt::Display for TrendStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendStrength::Strong => write!(f, "strong"),
            TrendStrength::Moderate => write!(f, "moderate"),
            TrendStrength::Weak => write!(f, "weak"),
            TrendStrength::Neutral => write!(f, "neutral"),
        }
    }
}

/// Percentage separations used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReading {
    pub strength: TrendStrength,
    /// |medium - slow| / slow, in percent.
    pub spread_pct: f64,
    /// |fast - medium| / medium, in percent.
    pub momentum_pct: f64,
    /// fast/medium and medium/slow point the same way.
    pub consistent: bool,
}

fn pct(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        (a - b).abs() / b.abs() * 100.0
    }
}

pub fn classify(snapshot: &MaSnapshot, settings: &ValidationSettings) -> TrendReading {
    let spread_pct = pct(snapshot.medium, snapshot.slow);
    let momentum_pct = pct(snapshot.fast, snapshot.medium);
    let upper = snapshot.fast - snapshot.medium;
    let lower = snapshot.medium - snapshot.slow;
    let consistent = (upper > 0.0 && lower > 0.0) || (upper < 0.0 && lower < 0.0);

    let ranging = settings.ranging_threshold_pct;
    let trending = settings.trending_threshold_pct;
    let strength = if spread_pct < ranging {
        TrendStrength::Neutral
    } else if spread_pct >= trending && consistent && momentum_pct >= trending / 2.0 {
        TrendStrength::Strong
    } else if spread_pct >= (ranging + trending) / 2.0 && consistent {
        TrendStrength::Moderate
    } else {
        TrendStrength::Weak
    };

    TrendReading {
        strength,
        spread_pct,
        momentum_pct,
        consistent,
    }
}

/// Alignment confidence required for a trend of `strength`, clamped to 0..=100.
pub fn alignment_threshold(strength: TrendStrength, settings: &ValidationSettings) -> f64 {
    let adj = match strength {
        TrendStrength::Strong => settings.trend_adjustments.strong,
        TrendStrength::Moderate => settings.trend_adjustments.moderate,
        TrendStrength::Weak | TrendStrength::Neutral => settings.trend_adjustments.weak,
    };
    (settings.alignment_base_threshold + adj).clamp(0.0, 100.0)
}
