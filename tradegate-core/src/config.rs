//! Strategy configuration loaded from TOML.
//!
//! Every section has documented defaults, so a file only needs the values it
//! changes. Invalid values are rejected by [`StrategyConfig::validate`] at
//! load time, never inside the decision path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::alignment::AlignmentConfig;
use crate::direction::OverrideConfig;
use crate::divergence::DivergenceConfig;
use crate::domain::{Instrument, SymbolClass, Timeframe};
use crate::swing::SwingConfig;
use crate::validation::ValidationSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config: {0}")]
    Serialize(String),
    #[error("invalid config: {field}: {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Which timeframes each component reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeframeConfig {
    /// Swing, divergence, trend and setup evaluation.
    pub entry: Timeframe,
    /// Bar whose open time drives the per-bar trade counters.
    pub tracking: Timeframe,
    /// Timeframes averaged into the composite alignment component.
    pub alignment: Vec<Timeframe>,
}

impl Default for TimeframeConfig {
    fn default() -> Self {
        Self {
            entry: Timeframe::H1,
            tracking: Timeframe::H1,
            alignment: vec![Timeframe::H1, Timeframe::H4, Timeframe::D1],
        }
    }
}

/// Partial per-symbol settings, applied after the symbol-class adjustment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_spread_points: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranging_threshold_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending_threshold_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_trades_per_instrument: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_trades_per_bar: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment_base_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pullback_buy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pullback_sell: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular_buy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular_sell: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pullback_proximity_points: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_retracement_points: Option<f64>,
}

impl SymbolOverrides {
    pub fn apply(&self, settings: &mut ValidationSettings) {
        fn set<T: Copy>(target: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *target = v;
            }
        }
        set(&mut settings.max_spread_points, self.max_spread_points);
        set(&mut settings.ranging_threshold_pct, self.ranging_threshold_pct);
        set(&mut settings.trending_threshold_pct, self.trending_threshold_pct);
        set(&mut settings.max_trades_per_instrument, self.max_trades_per_instrument);
        set(&mut settings.max_trades_per_bar, self.max_trades_per_bar);
        set(&mut settings.alignment_base_threshold, self.alignment_base_threshold);
        set(&mut settings.thresholds.pullback_buy, self.pullback_buy);
        set(&mut settings.thresholds.pullback_sell, self.pullback_sell);
        set(&mut settings.thresholds.regular_buy, self.regular_buy);
        set(&mut settings.thresholds.regular_sell, self.regular_sell);
        set(&mut settings.pullback_proximity_points, self.pullback_proximity_points);
        set(&mut settings.min_retracement_points, self.min_retracement_points);
    }
}

/// Complete strategy configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub timeframes: TimeframeConfig,
    pub swing: SwingConfig,
    pub divergence: DivergenceConfig,
    pub alignment: AlignmentConfig,
    pub validation: ValidationSettings,
    #[serde(rename = "override")]
    pub override_: OverrideConfig,
    /// Keyed by symbol, matched case-insensitively.
    pub symbols: BTreeMap<String, SymbolOverrides>,
}

impl StrategyConfig {
    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Content hash of the configuration. Identical settings give identical
    /// fingerprints, which lets replay outputs be matched to their config.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    fn overrides_for(&self, symbol: &str) -> Option<&SymbolOverrides> {
        self.symbols
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(symbol))
            .map(|(_, o)| o)
    }

    /// Validation settings for one instrument: base values, then the
    /// symbol-class adjustment, then any `[symbols.X]` overrides.
    pub fn settings_for(&self, instrument: &Instrument) -> ValidationSettings {
        let mut settings = self.validation.adjusted_for(instrument.class);
        if let Some(o) = self.overrides_for(&instrument.symbol) {
            o.apply(&mut settings);
        }
        settings
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_swing()?;
        self.validate_divergence()?;
        self.validate_alignment()?;
        self.validation.check()?;
        for (symbol, overrides) in &self.symbols {
            let mut settings = self.validation.adjusted_for(SymbolClass::classify(symbol));
            overrides.apply(&mut settings);
            settings.check().map_err(|e| match e {
                ConfigError::Invalid { field, reason } => ConfigError::Invalid {
                    field: format!("symbols.{symbol}: {field}"),
                    reason,
                },
                other => other,
            })?;
        }
        let o = &self.override_;
        if !(o.activation_threshold > 0.0 && o.activation_threshold <= self.divergence.max_score) {
            return Err(invalid(
                "override.activation_threshold",
                format!("must lie in (0, {}]", self.divergence.max_score),
            ));
        }
        if o.notice_every_trades == 0 {
            return Err(invalid("override.notice_every_trades", "must be >= 1"));
        }
        Ok(())
    }

    fn validate_swing(&self) -> Result<(), ConfigError> {
        let s = &self.swing;
        if s.radius == 0 {
            return Err(invalid("swing.radius", "must be >= 1"));
        }
        if s.window < 2 * s.radius + 1 {
            return Err(invalid(
                "swing.window",
                format!("must be at least 2 * radius + 1 ({})", 2 * s.radius + 1),
            ));
        }
        if s.strength_ceiling == 0 {
            return Err(invalid("swing.strength_ceiling", "must be >= 1"));
        }
        if !(s.strength_step_points > 0.0) {
            return Err(invalid("swing.strength_step_points", "must be > 0"));
        }
        Ok(())
    }

    fn validate_divergence(&self) -> Result<(), ConfigError> {
        let d = &self.divergence;
        if !(d.max_score > 0.0) {
            return Err(invalid("divergence.max_score", "must be > 0"));
        }
        if d.score_multiplier < 0.0 {
            return Err(invalid("divergence.score_multiplier", "must be >= 0"));
        }
        if !(0.0..=d.max_score).contains(&d.hidden_score) {
            return Err(invalid("divergence.hidden_score", format!("must lie in [0, {}]", d.max_score)));
        }
        if d.confirm_tolerance_points < 0.0 {
            return Err(invalid("divergence.confirm_tolerance_points", "must be >= 0"));
        }
        if d.max_age_bars < 0 {
            return Err(invalid("divergence.max_age_bars", "must be >= 0"));
        }
        d.decay.check().map_err(|reason| invalid("divergence.decay", reason))
    }

    fn validate_alignment(&self) -> Result<(), ConfigError> {
        let a = &self.alignment;
        let w = &a.weights;
        if [w.separation, w.direction, w.momentum, w.stack].iter().any(|&x| x < 0.0) {
            return Err(invalid("alignment.weights", "weights must be >= 0"));
        }
        let sum = w.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(invalid("alignment.weights", format!("must sum to 1.0 (got {sum:.6})")));
        }
        if !a.separation_bands.is_descending() {
            return Err(invalid("alignment.separation_bands", "expected excellent > good > fair > 0"));
        }
        if !a.momentum_bands.is_descending() {
            return Err(invalid("alignment.momentum_bands", "expected excellent > good > fair > 0"));
        }
        if a.direction_close_band < 0.0 || a.pullback_band < 0.0 || a.buffer_points < 0.0 {
            return Err(invalid("alignment", "bands and buffer must be >= 0"));
        }
        if !(0.0..=1.0).contains(&a.buffer_discount) {
            return Err(invalid("alignment.buffer_discount", "must lie in [0, 1]"));
        }
        Ok(())
    }
}
