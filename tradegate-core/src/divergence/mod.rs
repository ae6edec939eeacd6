//! Price/oscillator divergence: classification, age decay and the
//! per-instrument "current divergence" accumulator.

pub mod classifier;
pub mod decay;
pub mod tracker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TradeDirection;

pub use classifier::classify;
pub use decay::{AgeBucket, DecayBucket, DecayTable};
pub use tracker::DivergenceTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DivergenceDirection {
    Bullish,
    Bearish,
}

impl DivergenceDirection {
    /// The entry side this divergence argues for.
    pub fn implied_trade(self) -> TradeDirection {
        match self {
            DivergenceDirection::Bullish => TradeDirection::Buy,
            DivergenceDirection::Bearish => TradeDirection::Sell,
        }
    }
}

impl std::fmt::Display for DivergenceDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DivergenceDirection::Bullish => write!(f, "bullish"),
            DivergenceDirection::Bearish => write!(f, "bearish"),
        }
    }
}

/// Regular divergence signals reversal; hidden divergence signals continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DivergenceCategory {
    Regular,
    Hidden,
}

impl std::fmt::Display for DivergenceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DivergenceCategory::Regular => write!(f, "regular"),
            DivergenceCategory::Hidden => write!(f, "hidden"),
        }
    }
}

/// A classified divergence between the two most recent swings of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceSignal {
    pub direction: DivergenceDirection,
    pub category: DivergenceCategory,
    /// Time of the defining (latest) swing.
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub oscillator: f64,
    /// 1..=3
    pub strength: u8,
    pub confirmations: u32,
    /// 0..=max_score, never decayed in place.
    pub score: f64,
    pub first_detected: DateTime<Utc>,
}

impl DivergenceSignal {
    pub fn implied_trade(&self) -> TradeDirection {
        self.direction.implied_trade()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivergenceConfig {
    pub max_score: f64,
    /// Score per percent of oscillator disagreement for regular divergence.
    pub score_multiplier: f64,
    /// Fixed score assigned to hidden divergence.
    pub hidden_score: f64,
    /// Price distance (points) within which a new detection confirms the stored one.
    pub confirm_tolerance_points: f64,
    /// Signals older than this many bars are expired.
    pub max_age_bars: i64,
    pub decay: DecayTable,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            max_score: 100.0,
            score_multiplier: 5.0,
            hidden_score: 40.0,
            confirm_tolerance_points: 10.0,
            max_age_bars: 50,
            decay: DecayTable::default(),
        }
    }
}

/// Strength band (1..=3) for a score.
pub fn strength_for_score(score: f64) -> u8 {
    if score >= 70.0 {
        3
    } else if score >= 40.0 {
        2
    } else {
        1
    }
}
