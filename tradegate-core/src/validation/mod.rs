//! Sequential entry validation.
//!
//! Four gates run in a fixed order and the first failure short-circuits:
//! bar limits, primary eligibility, the ranging-market gate and the entry
//! sensitivity gate. `validate` only reads state apart from resetting the
//! per-bar counters when the tracking bar changes; `record_trade` is the only
//! operation that counts a trade.

pub mod bar_tracker;
pub mod rejection;
pub mod sensitivity;
pub mod settings;
pub mod trend;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alignment::{self, AlignmentConfig};
use crate::config::TimeframeConfig;
use crate::divergence::{DivergenceConfig, DivergenceTracker};
use crate::domain::{Instrument, TradeDirection};
use crate::execution::ExecutionView;
use crate::market::MarketData;

pub use bar_tracker::BarTracker;
pub use rejection::{Rejection, RejectionReason, ValidationGate};
pub use sensitivity::{SetupKind, SignalComponents};
pub use settings::{CompositeWeights, EntryThresholds, TrendAdjustments, ValidationSettings};
pub use trend::{TrendReading, TrendStrength};

/// Everything a validation pass reads. Nothing here is mutated.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    pub market: &'a dyn MarketData,
    pub execution: &'a dyn ExecutionView,
    pub instrument: &'a Instrument,
    pub timeframes: &'a TimeframeConfig,
    pub alignment: &'a AlignmentConfig,
    pub divergence: &'a DivergenceTracker,
    pub divergence_config: &'a DivergenceConfig,
    pub now: DateTime<Utc>,
}

/// Details of a passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryAssessment {
    pub direction: TradeDirection,
    pub trend: TrendStrength,
    pub alignment_confidence: f64,
    pub setup: SetupKind,
    pub components: SignalComponents,
    pub score: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Passed(EntryAssessment),
    Rejected(Rejection),
}

impl ValidationOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, ValidationOutcome::Passed(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ValidationOutcome::Passed(_) => None,
            ValidationOutcome::Rejected(r) => Some(r),
        }
    }
}

/// Per-instrument pipeline state: the bar tracker and the last entry bar.
#[derive(Debug, Clone)]
pub struct ValidationPipeline {
    settings: ValidationSettings,
    bars: BarTracker,
    last_entry_bar: Option<DateTime<Utc>>,
}

impl ValidationPipeline {
    pub fn new(settings: ValidationSettings) -> Self {
        Self {
            settings,
            bars: BarTracker::new(),
            last_entry_bar: None,
        }
    }

    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    pub fn bar_tracker(&self) -> &BarTracker {
        &self.bars
    }

    pub fn last_entry_bar(&self) -> Option<DateTime<Utc>> {
        self.last_entry_bar
    }

    /// Run all four gates for `direction`.
    pub fn validate(&mut self, direction: TradeDirection, ctx: &ValidationContext<'_>) -> ValidationOutcome {
        let result = self
            .bar_limit_gate(direction, ctx)
            .and_then(|()| self.eligibility_gate(direction, ctx))
            .and_then(|()| self.ranging_gate(direction, ctx))
            .and_then(|(trend, confidence)| self.sensitivity_gate(direction, ctx, trend, confidence));

        match result {
            Ok(assessment) => {
                debug!(
                    symbol = %ctx.instrument.symbol,
                    %direction,
                    setup = %assessment.setup,
                    score = assessment.score,
                    threshold = assessment.threshold,
                    "entry validated"
                );
                ValidationOutcome::Passed(assessment)
            }
            Err(rejection) => {
                debug!(
                    symbol = %ctx.instrument.symbol,
                    %direction,
                    gate = %rejection.gate,
                    reason = %rejection.reason,
                    "entry rejected"
                );
                ValidationOutcome::Rejected(rejection)
            }
        }
    }

    /// Count a trade taken on the given tracking and entry bars.
    pub fn record_trade(
        &mut self,
        direction: TradeDirection,
        tracking_bar: Option<DateTime<Utc>>,
        entry_bar: Option<DateTime<Utc>>,
    ) {
        if let Some(t) = tracking_bar {
            self.bars.observe(t);
        }
        self.bars.record(direction);
        if entry_bar.is_some() {
            self.last_entry_bar = entry_bar;
        }
        debug!(
            %direction,
            trades_this_bar = self.bars.trades_this_bar,
            "trade recorded"
        );
    }

    fn bar_limit_gate(&mut self, direction: TradeDirection, ctx: &ValidationContext<'_>) -> Result<(), Rejection> {
        let reject = |reason| Err(Rejection::new(ValidationGate::BarLimit, reason));

        let Some(bar_time) = ctx
            .market
            .bar_time(&ctx.instrument.symbol, ctx.timeframes.tracking, 0)
        else {
            return reject(RejectionReason::BarTimeUnavailable);
        };
        self.bars.observe(bar_time);

        if self.bars.trades_this_bar >= self.settings.max_trades_per_bar {
            return reject(RejectionReason::BarLimitReached {
                trades: self.bars.trades_this_bar,
                max: self.settings.max_trades_per_bar,
            });
        }
        if self.bars.traded(direction) {
            return reject(RejectionReason::DirectionTradedThisBar(direction));
        }
        Ok(())
    }

    fn eligibility_gate(&self, direction: TradeDirection, ctx: &ValidationContext<'_>) -> Result<(), Rejection> {
        let reject = |reason| Err(Rejection::new(ValidationGate::Eligibility, reason));
        let s = &self.settings;
        let symbol = ctx.instrument.symbol.as_str();
        let exec = ctx.execution;

        if !s.is_active(symbol) {
            return reject(RejectionReason::InstrumentInactive);
        }
        let holds_symbol = exec.open_positions(symbol) > 0;
        if !holds_symbol && exec.open_instruments() > 0 && exec.equity() < s.min_capital_for_additional {
            return reject(RejectionReason::InsufficientCapital {
                equity: exec.equity(),
                required: s.min_capital_for_additional,
            });
        }
        if exec.trades_today() >= s.max_daily_trades {
            return reject(RejectionReason::DailyLimitReached {
                trades: exec.trades_today(),
                max: s.max_daily_trades,
            });
        }
        // Only adding to the held direction counts against the limit; an
        // opposite entry reverses the position.
        let open = exec.open_positions(symbol);
        if exec.position_direction(symbol).matches(direction) && open >= s.max_trades_per_instrument {
            return reject(RejectionReason::InstrumentLimitReached {
                open,
                max: s.max_trades_per_instrument,
            });
        }

        let Some(spread) = ctx.market.spread(symbol).filter(|v| v.is_finite()) else {
            return reject(RejectionReason::SpreadUnavailable);
        };
        let spread_points = ctx.instrument.to_points(spread);
        if spread_points > s.max_spread_points {
            return reject(RejectionReason::SpreadTooWide {
                spread_points,
                max_points: s.max_spread_points,
            });
        }

        if s.one_trade_per_entry_bar {
            let entry_bar = ctx.market.bar_time(symbol, ctx.timeframes.entry, 0);
            if entry_bar.is_some() && entry_bar == self.last_entry_bar {
                return reject(RejectionReason::EntryBarAlreadyTraded);
            }
        }
        Ok(())
    }

    fn ranging_gate(
        &self,
        direction: TradeDirection,
        ctx: &ValidationContext<'_>,
    ) -> Result<(TrendStrength, f64), Rejection> {
        let reject = |reason| Err(Rejection::new(ValidationGate::Ranging, reason));
        let symbol = ctx.instrument.symbol.as_str();
        let tf = ctx.timeframes.entry;

        let Some(snapshot) = ctx.market.ma_snapshot(symbol, tf, 0) else {
            return reject(RejectionReason::InsufficientData(format!("{tf} moving averages")));
        };
        let Some(bar) = ctx.market.bar(symbol, tf, 0) else {
            return reject(RejectionReason::InsufficientData(format!("{tf} bar")));
        };

        let reading = trend::classify(&snapshot, &self.settings);
        if reading.strength == TrendStrength::Neutral {
            return reject(RejectionReason::RangingMarket {
                spread_pct: reading.spread_pct,
                threshold_pct: self.settings.ranging_threshold_pct,
            });
        }

        let confidence = alignment::score(&snapshot, ctx.instrument, ctx.alignment).confidence(direction);
        let threshold = trend::alignment_threshold(reading.strength, &self.settings);
        if confidence < threshold {
            return reject(RejectionReason::AlignmentTooWeak {
                confidence,
                threshold,
                trend: reading.strength,
            });
        }

        if (bar.close - snapshot.medium) * direction.sign() <= 0.0 {
            return reject(RejectionReason::PriceWrongSideOfMedium {
                price: bar.close,
                medium: snapshot.medium,
            });
        }
        Ok((reading.strength, confidence))
    }

    fn sensitivity_gate(
        &self,
        direction: TradeDirection,
        ctx: &ValidationContext<'_>,
        trend: TrendStrength,
        entry_confidence: f64,
    ) -> Result<EntryAssessment, Rejection> {
        let s = &self.settings;
        let tf = ctx.timeframes.entry;

        let setup = sensitivity::classify_setup(ctx.market, ctx.instrument, tf, direction, s);

        let confidences: Vec<f64> = ctx
            .timeframes
            .alignment
            .iter()
            .map(|&t| alignment::score_market(ctx.market, ctx.instrument, t, ctx.alignment))
            .filter(|score| score.gaps.is_some())
            .map(|score| score.confidence(direction))
            .collect();
        let alignment = if confidences.is_empty() {
            entry_confidence
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };

        let (momentum, band) = sensitivity::oscillator_components(ctx.market, ctx.instrument, tf, direction, s);
        let divergence = ctx
            .divergence
            .directional_score(direction, ctx.now, tf, ctx.divergence_config);
        let penalty = ctx.divergence.risk_penalty(
            direction,
            s.divergence_penalty_factor,
            ctx.now,
            tf,
            ctx.divergence_config,
        );

        let components = SignalComponents {
            alignment,
            momentum,
            band,
            divergence,
            penalty,
        };
        let score = components.composite(&s.composite_weights);
        let threshold = s.entry_threshold(setup == SetupKind::Pullback, direction == TradeDirection::Buy);

        if score < threshold {
            return Err(Rejection::new(
                ValidationGate::Sensitivity,
                RejectionReason::ScoreBelowThreshold { setup, score, threshold },
            ));
        }
        Ok(EntryAssessment {
            direction,
            trend,
            alignment_confidence: alignment,
            setup,
            components,
            score,
            threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, MaSlot, Timeframe};
    use crate::execution::PaperBook;
    use crate::market::SeriesStore;
    use chrono::{Duration, TimeZone};

    const SYM: &str = "EURUSD";

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap()
    }

    /// Ten H1 bars in a clean bull stack (gaps 20/40/60 pts at 0.0001).
    fn bull_store() -> SeriesStore {
        let n = 10;
        let bars = (0..n)
            .map(|i| Bar {
                timestamp: start() + Duration::hours(i as i64),
                open: 1.1042,
                high: 1.1045,
                low: 1.1039,
                close: 1.1042,
                volume: 500.0,
            })
            .collect();
        let mut store = SeriesStore::new();
        store.insert_bars(SYM, Timeframe::H1, bars);
        store.insert_average(SYM, Timeframe::H1, MaSlot::VeryFast, vec![1.1060; n]);
        store.insert_average(SYM, Timeframe::H1, MaSlot::Fast, vec![1.1040; n]);
        store.insert_average(SYM, Timeframe::H1, MaSlot::Medium, vec![1.1000; n]);
        store.insert_average(SYM, Timeframe::H1, MaSlot::Slow, vec![1.0940; n]);
        store.insert_oscillator(SYM, Timeframe::H1, vec![50.0; n]);
        store.set_spread(SYM, 0.0002);
        store
    }

    struct Fixture {
        store: SeriesStore,
        book: PaperBook,
        instrument: Instrument,
        timeframes: TimeframeConfig,
        alignment: AlignmentConfig,
        tracker: DivergenceTracker,
        divergence: DivergenceConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: bull_store(),
                book: PaperBook::new(10_000.0),
                instrument: Instrument::new(SYM, 0.0001),
                timeframes: TimeframeConfig {
                    entry: Timeframe::H1,
                    tracking: Timeframe::H1,
                    alignment: vec![Timeframe::H1],
                },
                alignment: AlignmentConfig::default(),
                tracker: DivergenceTracker::new(),
                divergence: DivergenceConfig::default(),
            }
        }

        fn ctx(&self) -> ValidationContext<'_> {
            ValidationContext {
                market: &self.store,
                execution: &self.book,
                instrument: &self.instrument,
                timeframes: &self.timeframes,
                alignment: &self.alignment,
                divergence: &self.tracker,
                divergence_config: &self.divergence,
                now: start() + Duration::hours(9),
            }
        }

        fn bar_time(&self) -> Option<DateTime<Utc>> {
            self.store.bar_time(SYM, Timeframe::H1, 0)
        }
    }

    fn gate(outcome: &ValidationOutcome) -> Option<ValidationGate> {
        outcome.rejection().map(|r| r.gate)
    }

    #[test]
    fn clean_bull_trend_passes_buy() {
        let fx = Fixture::new();
        let mut pipeline = ValidationPipeline::new(ValidationSettings::default());
        let outcome = pipeline.validate(TradeDirection::Buy, &fx.ctx());
        let ValidationOutcome::Passed(assessment) = outcome else {
            panic!("expected pass, got {outcome:?}");
        };
        assert_eq!(assessment.trend, TrendStrength::Strong);
        assert_eq!(assessment.setup, SetupKind::Regular);
        assert!((assessment.score - 70.0).abs() < 1e-6);
    }

    #[test]
    fn sell_fails_alignment_in_bull_trend() {
        let fx = Fixture::new();
        let mut pipeline = ValidationPipeline::new(ValidationSettings::default());
        let outcome = pipeline.validate(TradeDirection::Sell, &fx.ctx());
        assert_eq!(gate(&outcome), Some(ValidationGate::Ranging));
        assert!(matches!(
            outcome.rejection().map(|r| &r.reason),
            Some(RejectionReason::AlignmentTooWeak { .. })
        ));
    }

    #[test]
    fn validate_does_not_count_trades() {
        let fx = Fixture::new();
        let mut pipeline = ValidationPipeline::new(ValidationSettings::default());
        let first = pipeline.validate(TradeDirection::Buy, &fx.ctx());
        let counters = pipeline.bar_tracker().clone();
        let second = pipeline.validate(TradeDirection::Buy, &fx.ctx());
        assert_eq!(first, second);
        assert_eq!(&counters, pipeline.bar_tracker());
        assert_eq!(counters.trades_this_bar, 0);
    }

    #[test]
    fn bar_limit_rejects_first() {
        let fx = Fixture::new();
        let mut pipeline = ValidationPipeline::new(ValidationSettings::default());
        pipeline.record_trade(TradeDirection::Sell, fx.bar_time(), None);
        let outcome = pipeline.validate(TradeDirection::Buy, &fx.ctx());
        assert_eq!(
            outcome.rejection().map(|r| &r.reason),
            Some(&RejectionReason::BarLimitReached { trades: 1, max: 1 })
        );
    }

    #[test]
    fn direction_flag_blocks_repeat_direction() {
        let fx = Fixture::new();
        let settings = ValidationSettings {
            max_trades_per_bar: 3,
            one_trade_per_entry_bar: false,
            ..ValidationSettings::default()
        };
        let mut pipeline = ValidationPipeline::new(settings);
        pipeline.record_trade(TradeDirection::Buy, fx.bar_time(), fx.bar_time());
        let outcome = pipeline.validate(TradeDirection::Buy, &fx.ctx());
        assert_eq!(
            outcome.rejection().map(|r| &r.reason),
            Some(&RejectionReason::DirectionTradedThisBar(TradeDirection::Buy))
        );
    }

    #[test]
    fn new_bar_resets_counters() {
        let mut fx = Fixture::new();
        let mut pipeline = ValidationPipeline::new(ValidationSettings::default());
        fx.store.set_cursor(SYM, 8);
        pipeline.record_trade(TradeDirection::Buy, fx.bar_time(), fx.bar_time());
        assert!(!pipeline.validate(TradeDirection::Buy, &fx.ctx()).is_passed());
        fx.store.set_cursor(SYM, 9);
        assert!(pipeline.validate(TradeDirection::Buy, &fx.ctx()).is_passed());
        assert_eq!(pipeline.bar_tracker().trades_this_bar, 0);
    }

    #[test]
    fn wide_spread_rejected() {
        let mut fx = Fixture::new();
        fx.store.set_spread(SYM, 0.0030);
        let mut pipeline = ValidationPipeline::new(ValidationSettings::default());
        let outcome = pipeline.validate(TradeDirection::Buy, &fx.ctx());
        assert_eq!(gate(&outcome), Some(ValidationGate::Eligibility));
        assert!(outcome.rejection().is_some_and(|r| r.reason.to_string().contains("spread too wide")));
    }

    #[test]
    fn inactive_symbol_rejected() {
        let fx = Fixture::new();
        let settings = ValidationSettings {
            active_symbols: vec!["GBPUSD".into()],
            ..ValidationSettings::default()
        };
        let mut pipeline = ValidationPipeline::new(settings);
        let outcome = pipeline.validate(TradeDirection::Buy, &fx.ctx());
        assert_eq!(
            outcome.rejection().map(|r| &r.reason),
            Some(&RejectionReason::InstrumentInactive)
        );
    }

    #[test]
    fn capital_needed_for_additional_instrument() {
        let mut fx = Fixture::new();
        fx.book = PaperBook::new(500.0);
        fx.book.open("GBPUSD", TradeDirection::Buy, 1.0, 1.25, start());
        let mut pipeline = ValidationPipeline::new(ValidationSettings::default());
        let outcome = pipeline.validate(TradeDirection::Buy, &fx.ctx());
        assert!(matches!(
            outcome.rejection().map(|r| &r.reason),
            Some(RejectionReason::InsufficientCapital { .. })
        ));
    }

    #[test]
    fn holding_same_direction_hits_instrument_limit() {
        let mut fx = Fixture::new();
        fx.book.open(SYM, TradeDirection::Buy, 1.0, 1.1, start());
        let mut pipeline = ValidationPipeline::new(ValidationSettings::default());
        let outcome = pipeline.validate(TradeDirection::Buy, &fx.ctx());
        assert!(matches!(
            outcome.rejection().map(|r| &r.reason),
            Some(RejectionReason::InstrumentLimitReached { open: 1, max: 1 })
        ));
    }

    #[test]
    fn flat_averages_are_ranging() {
        let mut fx = Fixture::new();
        for slot in MaSlot::ALL {
            fx.store.insert_average(SYM, Timeframe::H1, slot, vec![1.1000; 10]);
        }
        let mut pipeline = ValidationPipeline::new(ValidationSettings::default());
        let outcome = pipeline.validate(TradeDirection::Buy, &fx.ctx());
        assert!(matches!(
            outcome.rejection().map(|r| &r.reason),
            Some(RejectionReason::RangingMarket { .. })
        ));
    }

    #[test]
    fn price_below_medium_rejected_for_buy() {
        let mut fx = Fixture::new();
        let bars = (0..10)
            .map(|i| Bar {
                timestamp: start() + Duration::hours(i),
                open: 1.0990,
                high: 1.0992,
                low: 1.0988,
                close: 1.0990,
                volume: 1.0,
            })
            .collect();
        fx.store.insert_bars(SYM, Timeframe::H1, bars);
        let mut pipeline = ValidationPipeline::new(ValidationSettings::default());
        let outcome = pipeline.validate(TradeDirection::Buy, &fx.ctx());
        assert!(matches!(
            outcome.rejection().map(|r| &r.reason),
            Some(RejectionReason::PriceWrongSideOfMedium { .. })
        ));
    }

    #[test]
    fn higher_threshold_rejects_at_sensitivity() {
        let fx = Fixture::new();
        let mut settings = ValidationSettings::default();
        settings.thresholds.regular_buy = 80.0;
        let mut pipeline = ValidationPipeline::new(settings);
        let outcome = pipeline.validate(TradeDirection::Buy, &fx.ctx());
        assert_eq!(gate(&outcome), Some(ValidationGate::Sensitivity));
    }

    #[test]
    fn missing_data_is_a_rejection_not_a_panic() {
        let fx = Fixture::new();
        let empty = SeriesStore::new();
        let ctx = ValidationContext { market: &empty, ..fx.ctx() };
        let mut pipeline = ValidationPipeline::new(ValidationSettings::default());
        let outcome = pipeline.validate(TradeDirection::Buy, &ctx);
        assert_eq!(
            outcome.rejection().map(|r| &r.reason),
            Some(&RejectionReason::BarTimeUnavailable)
        );
    }
}
