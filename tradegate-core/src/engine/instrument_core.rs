use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::alignment::{self, AlignmentScore};
use crate::config::StrategyConfig;
use crate::direction::{DirectionOverride, DirectionPermission};
use crate::divergence::{self, DivergenceTracker};
use crate::domain::{Instrument, TradeDirection};
use crate::execution::ExecutionView;
use crate::market::MarketData;
use crate::swing;
use crate::validation::{ValidationContext, ValidationOutcome, ValidationPipeline};

use super::status::{DivergenceStatus, StatusSnapshot};

/// Owns all mutable decision state for one instrument.
#[derive(Debug, Clone)]
pub struct InstrumentCore {
    instrument: Instrument,
    config: StrategyConfig,
    tracker: DivergenceTracker,
    direction: DirectionOverride,
    pipeline: ValidationPipeline,
    last_update: Option<DateTime<Utc>>,
    last_alignment: Option<AlignmentScore>,
    last_permission: Option<DirectionPermission>,
}

impl InstrumentCore {
    /// The config is assumed validated; per-symbol settings are resolved here.
    pub fn new(instrument: Instrument, config: &StrategyConfig) -> Self {
        let settings = config.settings_for(&instrument);
        Self {
            direction: DirectionOverride::new(config.override_.clone()),
            pipeline: ValidationPipeline::new(settings),
            tracker: DivergenceTracker::new(),
            config: config.clone(),
            instrument,
            last_update: None,
            last_alignment: None,
            last_permission: None,
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn divergence(&self) -> &DivergenceTracker {
        &self.tracker
    }

    pub fn direction_override(&self) -> &DirectionOverride {
        &self.direction
    }

    pub fn direction_override_mut(&mut self) -> &mut DirectionOverride {
        &mut self.direction
    }

    pub fn pipeline(&self) -> &ValidationPipeline {
        &self.pipeline
    }

    /// Refresh divergence state and return the allowed directions.
    pub fn on_market_update(
        &mut self,
        market: &dyn MarketData,
        execution: &dyn ExecutionView,
        now: DateTime<Utc>,
    ) -> DirectionPermission {
        let tf = self.config.timeframes.entry;
        let swings = swing::extract_from_market(market, &self.instrument, tf, &self.config.swing);
        trace!(
            symbol = %self.instrument.symbol,
            peaks = swings.peaks.len(),
            troughs = swings.troughs.len(),
            "swings extracted"
        );

        if let Some(detection) = divergence::classify(&swings, &self.config.divergence, now) {
            self.tracker.update(detection, &self.config.divergence, &self.instrument);
        }
        if self.tracker.is_expired(now, tf, &self.config.divergence) {
            debug!(symbol = %self.instrument.symbol, "divergence expired");
            self.tracker.clear();
        }

        let position = execution.position_direction(&self.instrument.symbol);
        self.direction.observe_position(position);
        let permission = self.direction.evaluate(self.tracker.current(), position, now);

        self.last_alignment = Some(alignment::score_market(
            market,
            &self.instrument,
            tf,
            &self.config.alignment,
        ));
        self.last_permission = Some(permission);
        self.last_update = Some(now);
        permission
    }

    /// Run the validation pipeline for a prospective entry.
    pub fn validate_entry(
        &mut self,
        direction: TradeDirection,
        market: &dyn MarketData,
        execution: &dyn ExecutionView,
        now: DateTime<Utc>,
    ) -> ValidationOutcome {
        let ctx = ValidationContext {
            market,
            execution,
            instrument: &self.instrument,
            timeframes: &self.config.timeframes,
            alignment: &self.config.alignment,
            divergence: &self.tracker,
            divergence_config: &self.config.divergence,
            now,
        };
        self.pipeline.validate(direction, &ctx)
    }

    /// Count a trade taken on the current bar. Returns an override status
    /// notice when one is due.
    pub fn record_trade(
        &mut self,
        direction: TradeDirection,
        market: &dyn MarketData,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let symbol = self.instrument.symbol.as_str();
        let tracking = market.bar_time(symbol, self.config.timeframes.tracking, 0);
        let entry = market.bar_time(symbol, self.config.timeframes.entry, 0);
        self.pipeline.record_trade(direction, tracking, entry);
        self.last_update = Some(self.last_update.map_or(now, |t| t.max(now)));
        self.direction.record_trade()
    }

    /// Read-only projection for operator display.
    pub fn status(&self) -> StatusSnapshot {
        let tf = self.config.timeframes.entry;
        let divergence = match (self.tracker.current(), self.last_update) {
            (Some(signal), Some(now)) => Some(DivergenceStatus {
                direction: signal.direction,
                category: signal.category,
                score: signal.score,
                decayed_score: self.tracker.decayed_score(now, tf, &self.config.divergence),
                confirmations: signal.confirmations,
                age_bars: self.tracker.age_bars(now, tf).unwrap_or(0),
            }),
            _ => None,
        };
        let bars = self.pipeline.bar_tracker();
        StatusSnapshot {
            symbol: self.instrument.symbol.clone(),
            at: self.last_update,
            divergence,
            buy_alignment: self.last_alignment.as_ref().map_or(0.0, |a| a.buy_confidence),
            sell_alignment: self.last_alignment.as_ref().map_or(0.0, |a| a.sell_confidence),
            bias: self.last_alignment.as_ref().map(|a| a.bias),
            alignment_warning: self
                .last_alignment
                .as_ref()
                .map(|a| a.warning.clone())
                .unwrap_or_default(),
            override_state: self.direction.state().clone(),
            permission: self.last_permission,
            trades_this_bar: bars.trades_this_bar,
            last_bar_time: bars.last_bar_time,
        }
    }
}
