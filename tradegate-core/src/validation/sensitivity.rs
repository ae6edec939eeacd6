//! Setup classification and the composite entry score.

use serde::{Deserialize, Serialize};

use crate::domain::{Instrument, MaSlot, Timeframe, TradeDirection};
use crate::market::MarketData;

use super::settings::{CompositeWeights, ValidationSettings};

const NEUTRAL: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupKind {
    /// Price back near the fast average after retracing from a recent extreme.
    Pullback,
    Regular,
}

impl std::fmt::Display for SetupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupKind::Pullback => write!(f, "pullback"),
            SetupKind::Regular => write!(f, "regular"),
        }
    }
}

/// Classify the current entry-timeframe bar.
///
/// Pullback requires price within the proximity band of the fast average,
/// the fast average on the trade side of the medium, and a retracement of at
/// least the configured size from the extreme of the lookback bars.
pub fn classify_setup(
    market: &dyn MarketData,
    instrument: &Instrument,
    timeframe: Timeframe,
    direction: TradeDirection,
    settings: &ValidationSettings,
) -> SetupKind {
    let symbol = instrument.symbol.as_str();
    let (Some(bar), Some(fast), Some(medium)) = (
        market.bar(symbol, timeframe, 0),
        market.moving_average(symbol, timeframe, MaSlot::Fast, 0),
        market.moving_average(symbol, timeframe, MaSlot::Medium, 0),
    ) else {
        return SetupKind::Regular;
    };

    let near_fast = instrument.to_points((bar.close - fast).abs()) <= settings.pullback_proximity_points;
    let trend_intact = (fast - medium) * direction.sign() > 0.0;
    if !near_fast || !trend_intact {
        return SetupKind::Regular;
    }

    let lookback: Vec<_> = (1..=settings.pullback_lookback_bars)
        .map_while(|offset| market.bar(symbol, timeframe, offset))
        .collect();
    if lookback.is_empty() {
        return SetupKind::Regular;
    }
    let retracement = match direction {
        TradeDirection::Buy => {
            let high = lookback.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            high - bar.close
        }
        TradeDirection::Sell => {
            let low = lookback.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            bar.close - low
        }
    };

    if instrument.to_points(retracement) >= settings.min_retracement_points {
        SetupKind::Pullback
    } else {
        SetupKind::Regular
    }
}

/// 50 shifted by the oscillator change in the trade direction, within 0..=100.
pub fn momentum_score(now: f64, previous: f64, direction: TradeDirection, scale: f64) -> f64 {
    let shift = ((now - previous) * direction.sign() * scale).clamp(-50.0, 50.0);
    NEUTRAL + shift
}

/// Oscillator band filter: buys favour oversold, sells favour overbought.
pub fn band_score(oscillator: f64, direction: TradeDirection, oversold: f64, overbought: f64) -> f64 {
    let width = overbought - oversold;
    if width <= 0.0 {
        return NEUTRAL;
    }
    let room_up = ((overbought - oscillator) / width).clamp(0.0, 1.0) * 100.0;
    match direction {
        TradeDirection::Buy => room_up,
        TradeDirection::Sell => 100.0 - room_up,
    }
}

/// Components of one composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalComponents {
    pub alignment: f64,
    pub momentum: f64,
    pub band: f64,
    pub divergence: f64,
    /// Subtracted after weighting.
    pub penalty: f64,
}

impl SignalComponents {
    pub fn composite(&self, weights: &CompositeWeights) -> f64 {
        let weighted = self.alignment * weights.alignment
            + self.momentum * weights.momentum
            + self.band * weights.band
            + self.divergence * weights.divergence;
        (weighted - self.penalty).clamp(0.0, 100.0)
    }
}

/// Momentum and band components from the entry-timeframe oscillator.
/// Missing values are neutral.
pub fn oscillator_components(
    market: &dyn MarketData,
    instrument: &Instrument,
    timeframe: Timeframe,
    direction: TradeDirection,
    settings: &ValidationSettings,
) -> (f64, f64) {
    let symbol = instrument.symbol.as_str();
    let now = market.oscillator(symbol, timeframe, 0).filter(|v| v.is_finite());
    let previous = market.oscillator(symbol, timeframe, 1).filter(|v| v.is_finite());

    let momentum = match (now, previous) {
        (Some(a), Some(b)) => momentum_score(a, b, direction, settings.momentum_scale),
        _ => NEUTRAL,
    };
    let band = now.map_or(NEUTRAL, |v| {
        band_score(v, direction, settings.oscillator_oversold, settings.oscillator_overbought)
    });
    (momentum, band)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use crate::market::SeriesStore;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn momentum_follows_direction() {
        assert_eq!(momentum_score(55.0, 50.0, TradeDirection::Buy, 5.0), 75.0);
        assert_eq!(momentum_score(55.0, 50.0, TradeDirection::Sell, 5.0), 25.0);
        assert_eq!(momentum_score(90.0, 10.0, TradeDirection::Buy, 5.0), 100.0);
        assert_eq!(momentum_score(50.0, 50.0, TradeDirection::Buy, 5.0), 50.0);
    }

    #[test]
    fn band_is_linear_between_levels() {
        assert_eq!(band_score(20.0, TradeDirection::Buy, 30.0, 70.0), 100.0);
        assert_eq!(band_score(80.0, TradeDirection::Buy, 30.0, 70.0), 0.0);
        assert_eq!(band_score(50.0, TradeDirection::Buy, 30.0, 70.0), 50.0);
        assert_eq!(band_score(80.0, TradeDirection::Sell, 30.0, 70.0), 100.0);
        assert_eq!(band_score(40.0, TradeDirection::Sell, 30.0, 70.0), 25.0);
    }

    #[test]
    fn composite_subtracts_penalty_and_clamps() {
        let w = CompositeWeights::default();
        let c = SignalComponents { alignment: 100.0, momentum: 100.0, band: 100.0, divergence: 100.0, penalty: 0.0 };
        assert!((c.composite(&w) - 100.0).abs() < 1e-9);
        let c = SignalComponents { penalty: 30.0, ..c };
        assert!((c.composite(&w) - 70.0).abs() < 1e-9);
        let c = SignalComponents { alignment: 0.0, momentum: 0.0, band: 0.0, divergence: 0.0, penalty: 10.0 };
        assert_eq!(c.composite(&w), 0.0);
    }

    fn store_with(closes: &[f64], fast: f64, medium: f64) -> SeriesStore {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: start + Duration::hours(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 100.0,
            })
            .collect::<Vec<_>>();
        let n = bars.len();
        let mut store = SeriesStore::new();
        store.insert_bars("TEST", Timeframe::H1, bars);
        store.insert_average("TEST", Timeframe::H1, MaSlot::Fast, vec![fast; n]);
        store.insert_average("TEST", Timeframe::H1, MaSlot::Medium, vec![medium; n]);
        store
    }

    #[test]
    fn retracement_to_fast_is_pullback() {
        let inst = Instrument::new("TEST", 1.0);
        let settings = ValidationSettings::default();
        // rallied to 130, back to 119 near fast 118
        let store = store_with(&[110.0, 120.0, 130.0, 125.0, 119.0], 118.0, 100.0);
        let kind = classify_setup(&store, &inst, Timeframe::H1, TradeDirection::Buy, &settings);
        assert_eq!(kind, SetupKind::Pullback);
    }

    #[test]
    fn far_from_fast_is_regular() {
        let inst = Instrument::new("TEST", 1.0);
        let settings = ValidationSettings::default();
        let store = store_with(&[110.0, 120.0, 130.0, 125.0, 119.0], 100.0, 90.0);
        let kind = classify_setup(&store, &inst, Timeframe::H1, TradeDirection::Buy, &settings);
        assert_eq!(kind, SetupKind::Regular);
    }

    #[test]
    fn broken_trend_is_regular() {
        let inst = Instrument::new("TEST", 1.0);
        let settings = ValidationSettings::default();
        let store = store_with(&[110.0, 120.0, 130.0, 125.0, 119.0], 118.0, 125.0);
        let kind = classify_setup(&store, &inst, Timeframe::H1, TradeDirection::Buy, &settings);
        assert_eq!(kind, SetupKind::Regular);
    }
}
