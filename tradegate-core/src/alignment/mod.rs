//! Moving-average alignment scoring.
//!
//! Four averages (very fast, fast, medium, slow) on one timeframe are turned
//! into three signed gaps in points. The same four sub-rules run once with
//! buy polarity and once with sell polarity, giving two independent
//! confidences. A buffer check flags gaps too narrow to trust: a crossover is
//! close, so both confidences are discounted.

pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Instrument, MaGaps, MaSnapshot, Timeframe, TradeDirection};
use crate::market::MarketData;

pub use rules::{Bands, DirectedGaps, RuleBreakdown};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentWeights {
    pub separation: f64,
    pub direction: f64,
    pub momentum: f64,
    pub stack: f64,
}

impl AlignmentWeights {
    pub fn sum(&self) -> f64 {
        self.separation + self.direction + self.momentum + self.stack
    }

    pub fn apply(&self, rules: &RuleBreakdown) -> f64 {
        rules.separation * self.separation
            + rules.direction * self.direction
            + rules.momentum * self.momentum
            + rules.stack * self.stack
    }
}

impl Default for AlignmentWeights {
    fn default() -> Self {
        Self {
            separation: 0.25,
            direction: 0.30,
            momentum: 0.25,
            stack: 0.20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    pub weights: AlignmentWeights,
    /// Medium/slow gap bands for the separation rule (points).
    pub separation_bands: Bands,
    /// Half-width of the partial-credit band in the direction rule (points).
    pub direction_close_band: f64,
    /// Fast/medium gap bands for the momentum rule (points).
    pub momentum_bands: Bands,
    /// How far the fast average may sit on the wrong side and still earn pullback credit.
    pub pullback_band: f64,
    /// Any gap narrower than this (points) raises a crossover warning.
    pub buffer_points: f64,
    /// Fraction removed from both confidences when a gap is inside the buffer.
    pub buffer_discount: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            weights: AlignmentWeights::default(),
            separation_bands: Bands { excellent: 30.0, good: 15.0, fair: 5.0 },
            direction_close_band: 2.0,
            momentum_bands: Bands { excellent: 15.0, good: 8.0, fair: 3.0 },
            pullback_band: 3.0,
            buffer_points: 3.0,
            buffer_discount: 0.30,
        }
    }
}

/// Qualitative reading of the net bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignmentBias {
    StrongBullish,
    Bullish,
    Neutral,
    Bearish,
    StrongBearish,
}

impl AlignmentBias {
    pub fn from_net(net_bias: f64) -> Self {
        if net_bias >= 60.0 {
            AlignmentBias::StrongBullish
        } else if net_bias >= 25.0 {
            AlignmentBias::Bullish
        } else if net_bias <= -60.0 {
            AlignmentBias::StrongBearish
        } else if net_bias <= -25.0 {
            AlignmentBias::Bearish
        } else {
            AlignmentBias::Neutral
        }
    }
}

impl fmt::Display for AlignmentBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlignmentBias::StrongBullish => "strong bullish",
            AlignmentBias::Bullish => "bullish",
            AlignmentBias::Neutral => "neutral",
            AlignmentBias::Bearish => "bearish",
            AlignmentBias::StrongBearish => "strong bearish",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentScore {
    pub buy_confidence: f64,
    pub sell_confidence: f64,
    /// buy - sell, in -100..=100.
    pub net_bias: f64,
    pub bias: AlignmentBias,
    /// Empty when nothing is wrong.
    pub warning: String,
    /// Medium/slow gap inside the buffer: the main trend is about to cross.
    pub critical: bool,
    pub buy_rules: RuleBreakdown,
    pub sell_rules: RuleBreakdown,
    pub gaps: Option<MaGaps>,
}

impl AlignmentScore {
    /// Zero-confidence result for missing data.
    pub fn unavailable(reason: &str) -> Self {
        Self {
            buy_confidence: 0.0,
            sell_confidence: 0.0,
            net_bias: 0.0,
            bias: AlignmentBias::Neutral,
            warning: reason.to_string(),
            critical: false,
            buy_rules: RuleBreakdown::default(),
            sell_rules: RuleBreakdown::default(),
            gaps: None,
        }
    }

    pub fn confidence(&self, direction: TradeDirection) -> f64 {
        match direction {
            TradeDirection::Buy => self.buy_confidence,
            TradeDirection::Sell => self.sell_confidence,
        }
    }
}

/// Run the four rules for one direction.
pub fn rule_breakdown(gaps: &MaGaps, direction: TradeDirection, config: &AlignmentConfig) -> RuleBreakdown {
    let d = DirectedGaps::new(gaps, direction);
    RuleBreakdown {
        separation: rules::separation(d.medium_slow, &config.separation_bands),
        direction: rules::direction(d.medium_slow, config.direction_close_band),
        momentum: rules::momentum(d.fast_medium, &config.momentum_bands, config.pullback_band),
        stack: rules::stack(&d),
    }
}

/// Score a snapshot of the four averages.
pub fn score(snapshot: &MaSnapshot, instrument: &Instrument, config: &AlignmentConfig) -> AlignmentScore {
    if !snapshot.is_finite() {
        return AlignmentScore::unavailable("moving averages unavailable");
    }
    let gaps = snapshot.gaps(instrument.point);
    score_gaps(&gaps, config)
}

/// Score precomputed gaps (points).
pub fn score_gaps(gaps: &MaGaps, config: &AlignmentConfig) -> AlignmentScore {
    let buy_rules = rule_breakdown(gaps, TradeDirection::Buy, config);
    let sell_rules = rule_breakdown(gaps, TradeDirection::Sell, config);
    let mut buy = config.weights.apply(&buy_rules).clamp(0.0, 100.0);
    let mut sell = config.weights.apply(&sell_rules).clamp(0.0, 100.0);

    let mut warnings = Vec::new();
    let named = [
        ("very-fast/fast", gaps.very_fast_fast),
        ("fast/medium", gaps.fast_medium),
        ("medium/slow", gaps.medium_slow),
    ];
    for (name, gap) in named {
        if gap.abs() < config.buffer_points {
            warnings.push(format!(
                "{name} gap {:.1} pts inside {:.1} pts buffer",
                gap, config.buffer_points
            ));
        }
    }
    let critical = gaps.medium_slow.abs() < config.buffer_points;
    if !warnings.is_empty() {
        let keep = (1.0 - config.buffer_discount).clamp(0.0, 1.0);
        buy *= keep;
        sell *= keep;
    }

    let net_bias = buy - sell;
    AlignmentScore {
        buy_confidence: buy,
        sell_confidence: sell,
        net_bias,
        bias: AlignmentBias::from_net(net_bias),
        warning: warnings.join("; "),
        critical,
        buy_rules,
        sell_rules,
        gaps: Some(*gaps),
    }
}

/// Read the averages from market data and score them.
///
/// The previous bar's averages are read as well; a sign change of the
/// fast/medium or medium/slow gap since then is reported in the warning.
pub fn score_market(
    market: &dyn MarketData,
    instrument: &Instrument,
    timeframe: Timeframe,
    config: &AlignmentConfig,
) -> AlignmentScore {
    let Some(current) = market.ma_snapshot(&instrument.symbol, timeframe, 0) else {
        return AlignmentScore::unavailable("moving averages unavailable");
    };
    let mut result = score(&current, instrument, config);

    if let Some(previous) = market.ma_snapshot(&instrument.symbol, timeframe, 1) {
        let now = current.gaps(instrument.point);
        let before = previous.gaps(instrument.point);
        let mut crosses = Vec::new();
        if crossed(before.fast_medium, now.fast_medium) {
            crosses.push("fast/medium crossed on the last bar");
        }
        if crossed(before.medium_slow, now.medium_slow) {
            crosses.push("medium/slow crossed on the last bar");
        }
        for c in crosses {
            if !result.warning.is_empty() {
                result.warning.push_str("; ");
            }
            result.warning.push_str(c);
        }
    }
    result
}

fn crossed(before: f64, now: f64) -> bool {
    (before > 0.0 && now < 0.0) || (before < 0.0 && now > 0.0)
}
