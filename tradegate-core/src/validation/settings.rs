//! Per-instrument validation thresholds.
//!
//! One parameterized pipeline reads these values; differences between
//! instruments are configuration, never separate code paths. Sell thresholds
//! default higher than buy thresholds. That asymmetry is deliberate
//! configuration and is kept as two independent values.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::SymbolClass;

/// Weights of the composite entry score. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub alignment: f64,
    pub momentum: f64,
    pub band: f64,
    pub divergence: f64,
}

impl CompositeWeights {
    pub fn sum(&self) -> f64 {
        self.alignment + self.momentum + self.band + self.divergence
    }
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            alignment: 0.40,
            momentum: 0.25,
            band: 0.20,
            divergence: 0.15,
        }
    }
}

/// Composite score thresholds by setup kind and direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryThresholds {
    pub pullback_buy: f64,
    pub pullback_sell: f64,
    pub regular_buy: f64,
    pub regular_sell: f64,
}

impl Default for EntryThresholds {
    fn default() -> Self {
        Self {
            pullback_buy: 55.0,
            pullback_sell: 65.0,
            regular_buy: 65.0,
            regular_sell: 75.0,
        }
    }
}

/// Shift applied to the base alignment threshold per trend strength.
/// Negative lowers the bar (stronger trend), positive raises it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendAdjustments {
    pub strong: f64,
    pub moderate: f64,
    pub weak: f64,
}

impl Default for TrendAdjustments {
    fn default() -> Self {
        Self {
            strong: -15.0,
            moderate: -5.0,
            weak: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Medium/slow separation (% of price) below which the market is ranging.
    pub ranging_threshold_pct: f64,
    /// Medium/slow separation (% of price) at or above which the trend is strong.
    pub trending_threshold_pct: f64,
    pub max_spread_points: f64,
    /// Open positions allowed on one instrument.
    pub max_trades_per_instrument: usize,
    pub max_trades_per_bar: u32,
    pub max_daily_trades: usize,
    /// Equity required before opening a position on an additional instrument.
    pub min_capital_for_additional: f64,
    /// Instruments allowed to trade. Empty allows all.
    pub active_symbols: Vec<String>,
    /// Reject a second entry on the same entry-timeframe bar.
    pub one_trade_per_entry_bar: bool,
    pub alignment_base_threshold: f64,
    pub trend_adjustments: TrendAdjustments,
    pub thresholds: EntryThresholds,
    pub composite_weights: CompositeWeights,
    pub oscillator_oversold: f64,
    pub oscillator_overbought: f64,
    /// Momentum component points per unit of oscillator change.
    pub momentum_scale: f64,
    /// Fraction of the decayed opposing divergence score subtracted from the composite.
    pub divergence_penalty_factor: f64,
    /// Max distance (points) between price and the fast average for a pullback setup.
    pub pullback_proximity_points: f64,
    pub pullback_lookback_bars: usize,
    /// Minimum retracement (points) from the recent extreme for a pullback setup.
    pub min_retracement_points: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            ranging_threshold_pct: 0.05,
            trending_threshold_pct: 0.25,
            max_spread_points: 25.0,
            max_trades_per_instrument: 1,
            max_trades_per_bar: 1,
            max_daily_trades: 10,
            min_capital_for_additional: 1_000.0,
            active_symbols: Vec::new(),
            one_trade_per_entry_bar: true,
            alignment_base_threshold: 55.0,
            trend_adjustments: TrendAdjustments::default(),
            thresholds: EntryThresholds::default(),
            composite_weights: CompositeWeights::default(),
            oscillator_oversold: 30.0,
            oscillator_overbought: 70.0,
            momentum_scale: 5.0,
            divergence_penalty_factor: 0.30,
            pullback_proximity_points: 5.0,
            pullback_lookback_bars: 5,
            min_retracement_points: 8.0,
        }
    }
}

impl ValidationSettings {
    /// Widen thresholds for instrument families with larger spreads and moves.
    pub fn adjusted_for(&self, class: SymbolClass) -> Self {
        let mut s = self.clone();
        match class {
            SymbolClass::Metal => {
                s.max_spread_points *= 3.0;
                s.ranging_threshold_pct *= 2.0;
                s.trending_threshold_pct *= 2.0;
                s.pullback_proximity_points *= 10.0;
                s.min_retracement_points *= 10.0;
            }
            SymbolClass::YenCross => {
                s.max_spread_points *= 1.5;
            }
            SymbolClass::Index => {
                s.max_spread_points *= 2.0;
            }
            SymbolClass::Crypto => {
                s.max_spread_points *= 4.0;
                s.ranging_threshold_pct *= 2.0;
                s.trending_threshold_pct *= 2.0;
            }
            SymbolClass::Major | SymbolClass::Other => {}
        }
        s
    }

    pub fn is_active(&self, symbol: &str) -> bool {
        self.active_symbols.is_empty() || self.active_symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    /// Threshold for a setup kind and direction.
    pub fn entry_threshold(&self, pullback: bool, buy: bool) -> f64 {
        match (pullback, buy) {
            (true, true) => self.thresholds.pullback_buy,
            (true, false) => self.thresholds.pullback_sell,
            (false, true) => self.thresholds.regular_buy,
            (false, false) => self.thresholds.regular_sell,
        }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, reason: String| ConfigError::Invalid {
            field: format!("validation.{field}"),
            reason,
        };

        if !(self.ranging_threshold_pct > 0.0) {
            return Err(invalid("ranging_threshold_pct", "must be > 0".into()));
        }
        if self.ranging_threshold_pct >= self.trending_threshold_pct {
            return Err(invalid(
                "ranging_threshold_pct",
                format!(
                    "must be below trending_threshold_pct ({} >= {})",
                    self.ranging_threshold_pct, self.trending_threshold_pct
                ),
            ));
        }
        if !(self.max_spread_points > 0.0) {
            return Err(invalid("max_spread_points", "must be > 0".into()));
        }
        if self.max_trades_per_bar == 0 {
            return Err(invalid("max_trades_per_bar", "must be >= 1".into()));
        }
        if self.max_trades_per_instrument == 0 {
            return Err(invalid("max_trades_per_instrument", "must be >= 1".into()));
        }
        if self.max_daily_trades == 0 {
            return Err(invalid("max_daily_trades", "must be >= 1".into()));
        }
        if self.min_capital_for_additional < 0.0 {
            return Err(invalid("min_capital_for_additional", "must be >= 0".into()));
        }

        let percent_fields = [
            ("alignment_base_threshold", self.alignment_base_threshold),
            ("thresholds.pullback_buy", self.thresholds.pullback_buy),
            ("thresholds.pullback_sell", self.thresholds.pullback_sell),
            ("thresholds.regular_buy", self.thresholds.regular_buy),
            ("thresholds.regular_sell", self.thresholds.regular_sell),
            ("oscillator_oversold", self.oscillator_oversold),
            ("oscillator_overbought", self.oscillator_overbought),
        ];
        for (field, value) in percent_fields {
            if !(0.0..=100.0).contains(&value) {
                return Err(invalid(field, format!("{value} outside [0, 100]")));
            }
        }
        if self.oscillator_oversold >= self.oscillator_overbought {
            return Err(invalid("oscillator_oversold", "must be below oscillator_overbought".into()));
        }

        let sum = self.composite_weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(invalid("composite_weights", format!("must sum to 1.0 (got {sum:.6})")));
        }
        let w = self.composite_weights;
        if [w.alignment, w.momentum, w.band, w.divergence].iter().any(|&x| x < 0.0) {
            return Err(invalid("composite_weights", "weights must be >= 0".into()));
        }
        if !(0.0..=1.0).contains(&self.divergence_penalty_factor) {
            return Err(invalid("divergence_penalty_factor", "must lie in [0, 1]".into()));
        }
        if self.momentum_scale < 0.0 {
            return Err(invalid("momentum_scale", "must be >= 0".into()));
        }
        if self.pullback_lookback_bars == 0 {
            return Err(invalid("pullback_lookback_bars", "must be >= 1".into()));
        }
        Ok(())
    }
}
