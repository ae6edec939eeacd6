//! The single mutable "current divergence" per instrument.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Instrument, Timeframe, TradeDirection};

use super::{strength_for_score, DivergenceConfig, DivergenceSignal};

/// Neutral directional score when no usable divergence exists.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Holds the current divergence for one instrument and answers
/// age-aware questions about it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DivergenceTracker {
    current: Option<DivergenceSignal>,
}

impl DivergenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&DivergenceSignal> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Merge a fresh detection into the current divergence.
    ///
    /// Same direction, same category and a price level within the
    /// confirmation tolerance counts as the same divergence: the higher score and later timestamp are
    /// kept, and the confirmation count grows when the detection comes from a
    /// newer swing. Anything else replaces the stored signal.
    pub fn update(
        &mut self,
        detection: DivergenceSignal,
        config: &DivergenceConfig,
        instrument: &Instrument,
    ) {
        let Some(stored) = self.current.as_mut() else {
            self.current = Some(detection);
            return;
        };

        let distance = instrument.to_points((detection.price - stored.price).abs());
        let same = stored.direction == detection.direction
            && stored.category == detection.category
            && distance <= config.confirm_tolerance_points;
        if !same {
            debug!(
                old = %stored.category,
                new = %detection.category,
                direction = %detection.direction,
                distance,
                "divergence replaced"
            );
            self.current = Some(detection);
            return;
        }

        if detection.timestamp > stored.timestamp {
            stored.confirmations += 1;
            stored.timestamp = detection.timestamp;
            debug!(confirmations = stored.confirmations, "divergence confirmed");
        }
        if detection.score > stored.score {
            stored.score = detection.score;
            stored.strength = strength_for_score(stored.score);
        }
    }

    /// Age of the current signal in bars of `timeframe`, if any.
    pub fn age_bars(&self, now: DateTime<Utc>, timeframe: Timeframe) -> Option<i64> {
        self.current
            .as_ref()
            .map(|s| ((now - s.timestamp).num_seconds() / timeframe.seconds()).max(0))
    }

    pub fn is_expired(&self, now: DateTime<Utc>, timeframe: Timeframe, config: &DivergenceConfig) -> bool {
        self.age_bars(now, timeframe)
            .is_some_and(|age| age > config.max_age_bars)
    }

    /// The stored score multiplied by the age-bucket factor. Zero when there
    /// is no signal or it has expired.
    pub fn decayed_score(&self, now: DateTime<Utc>, timeframe: Timeframe, config: &DivergenceConfig) -> f64 {
        match (&self.current, self.age_bars(now, timeframe)) {
            (Some(signal), Some(age)) if age <= config.max_age_bars => {
                signal.score * config.decay.multiplier(age)
            }
            _ => 0.0,
        }
    }

    /// Support for a trade in `direction`: 50 shifted by half the decayed
    /// score, upward when the divergence points the same way.
    pub fn directional_score(
        &self,
        direction: TradeDirection,
        now: DateTime<Utc>,
        timeframe: Timeframe,
        config: &DivergenceConfig,
    ) -> f64 {
        let Some(signal) = &self.current else {
            return NEUTRAL_SCORE;
        };
        let half = self.decayed_score(now, timeframe, config) / 2.0;
        if signal.implied_trade() == direction {
            NEUTRAL_SCORE + half
        } else {
            NEUTRAL_SCORE - half
        }
    }

    /// Penalty applied to entries that go against the current divergence.
    pub fn risk_penalty(
        &self,
        direction: TradeDirection,
        factor: f64,
        now: DateTime<Utc>,
        timeframe: Timeframe,
        config: &DivergenceConfig,
    ) -> f64 {
        match &self.current {
            Some(signal) if signal.implied_trade() != direction => {
                self.decayed_score(now, timeframe, config) * factor
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::divergence::{DivergenceCategory, DivergenceDirection};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap()
    }

    fn signal(direction: DivergenceDirection, hours: i64, price: f64, score: f64) -> DivergenceSignal {
        DivergenceSignal {
            direction,
            category: DivergenceCategory::Regular,
            timestamp: t0() + Duration::hours(hours),
            price,
            oscillator: 40.0,
            strength: strength_for_score(score),
            confirmations: 1,
            score,
            first_detected: t0() + Duration::hours(hours),
        }
    }

    fn eurusd() -> Instrument {
        Instrument::new("EURUSD", 0.0001)
    }

    #[test]
    fn first_detection_is_stored() {
        let mut tracker = DivergenceTracker::new();
        tracker.update(signal(DivergenceDirection::Bullish, 0, 1.1000, 60.0), &DivergenceConfig::default(), &eurusd());
        assert_eq!(tracker.current().unwrap().score, 60.0);
    }

    #[test]
    fn matching_detection_confirms_and_keeps_higher_score() {
        let cfg = DivergenceConfig::default();
        let mut tracker = DivergenceTracker::new();
        tracker.update(signal(DivergenceDirection::Bullish, 0, 1.1000, 70.0), &cfg, &eurusd());
        // 5 points away, newer swing, lower score.
        tracker.update(signal(DivergenceDirection::Bullish, 4, 1.1005, 55.0), &cfg, &eurusd());
        let cur = tracker.current().unwrap();
        assert_eq!(cur.confirmations, 2);
        assert_eq!(cur.score, 70.0);
        assert_eq!(cur.timestamp, t0() + Duration::hours(4));
        assert_eq!(cur.first_detected, t0());
    }

    #[test]
    fn same_swing_redetected_does_not_inflate_confirmations() {
        let cfg = DivergenceConfig::default();
        let mut tracker = DivergenceTracker::new();
        let sig = signal(DivergenceDirection::Bearish, 0, 1.2000, 50.0);
        tracker.update(sig.clone(), &cfg, &eurusd());
        tracker.update(sig.clone(), &cfg, &eurusd());
        tracker.update(sig, &cfg, &eurusd());
        assert_eq!(tracker.current().unwrap().confirmations, 1);
    }

    #[test]
    fn different_direction_replaces() {
        let cfg = DivergenceConfig::default();
        let mut tracker = DivergenceTracker::new();
        tracker.update(signal(DivergenceDirection::Bullish, 0, 1.1000, 70.0), &cfg, &eurusd());
        tracker.update(signal(DivergenceDirection::Bearish, 2, 1.1000, 45.0), &cfg, &eurusd());
        let cur = tracker.current().unwrap();
        assert_eq!(cur.direction, DivergenceDirection::Bearish);
        assert_eq!(cur.confirmations, 1);
        assert_eq!(cur.score, 45.0);
    }

    #[test]
    fn regular_detection_replaces_hidden_signal() {
        let cfg = DivergenceConfig::default();
        let mut tracker = DivergenceTracker::new();
        let mut hidden = signal(DivergenceDirection::Bullish, 0, 1.1000, 40.0);
        hidden.category = DivergenceCategory::Hidden;
        tracker.update(hidden, &cfg, &eurusd());
        tracker.update(signal(DivergenceDirection::Bullish, 4, 1.0995, 90.0), &cfg, &eurusd());

        let cur = tracker.current().unwrap();
        assert_eq!(cur.category, DivergenceCategory::Regular);
        assert_eq!(cur.score, 90.0);
        assert_eq!(cur.confirmations, 1);
        assert_eq!(cur.first_detected, t0() + Duration::hours(4));
    }

    #[test]
    fn hidden_detection_does_not_merge_into_regular() {
        let cfg = DivergenceConfig::default();
        let mut tracker = DivergenceTracker::new();
        tracker.update(signal(DivergenceDirection::Bearish, 0, 1.2000, 80.0), &cfg, &eurusd());
        let mut hidden = signal(DivergenceDirection::Bearish, 3, 1.2002, 40.0);
        hidden.category = DivergenceCategory::Hidden;
        tracker.update(hidden, &cfg, &eurusd());

        let cur = tracker.current().unwrap();
        assert_eq!(cur.category, DivergenceCategory::Hidden);
        assert_eq!(cur.score, 40.0);
        assert_eq!(cur.confirmations, 1);
    }

    #[test]
    fn distant_price_replaces() {
        let cfg = DivergenceConfig::default();
        let mut tracker = DivergenceTracker::new();
        tracker.update(signal(DivergenceDirection::Bullish, 0, 1.1000, 70.0), &cfg, &eurusd());
        tracker.update(signal(DivergenceDirection::Bullish, 2, 1.1050, 30.0), &cfg, &eurusd());
        assert_eq!(tracker.current().unwrap().score, 30.0);
    }

    #[test]
    fn directional_score_uses_decay_without_mutating() {
        let cfg = DivergenceConfig::default();
        let mut tracker = DivergenceTracker::new();
        tracker.update(signal(DivergenceDirection::Bullish, 0, 1.1000, 80.0), &cfg, &eurusd());

        // Fresh: 50 +/- 40.
        let fresh = t0() + Duration::hours(2);
        assert_eq!(tracker.directional_score(TradeDirection::Buy, fresh, Timeframe::H1, &cfg), 90.0);
        assert_eq!(tracker.directional_score(TradeDirection::Sell, fresh, Timeframe::H1, &cfg), 10.0);

        // Aging (12 bars): 80 * 0.65 = 52 -> 50 + 26.
        let aging = t0() + Duration::hours(12);
        let score = tracker.directional_score(TradeDirection::Buy, aging, Timeframe::H1, &cfg);
        assert!((score - 76.0).abs() < 1e-9);
        assert_eq!(tracker.current().unwrap().score, 80.0);
    }

    #[test]
    fn expired_signal_is_neutral() {
        let cfg = DivergenceConfig::default();
        let mut tracker = DivergenceTracker::new();
        tracker.update(signal(DivergenceDirection::Bullish, 0, 1.1000, 80.0), &cfg, &eurusd());
        let later = t0() + Duration::hours(51);
        assert!(tracker.is_expired(later, Timeframe::H1, &cfg));
        assert_eq!(tracker.directional_score(TradeDirection::Buy, later, Timeframe::H1, &cfg), 50.0);
        assert_eq!(tracker.risk_penalty(TradeDirection::Sell, 0.3, later, Timeframe::H1, &cfg), 0.0);
    }

    #[test]
    fn risk_penalty_only_against_divergence() {
        let cfg = DivergenceConfig::default();
        let mut tracker = DivergenceTracker::new();
        tracker.update(signal(DivergenceDirection::Bearish, 0, 1.2000, 60.0), &cfg, &eurusd());
        let now = t0() + Duration::hours(1);
        assert!((tracker.risk_penalty(TradeDirection::Buy, 0.3, now, Timeframe::H1, &cfg) - 18.0).abs() < 1e-9);
        assert_eq!(tracker.risk_penalty(TradeDirection::Sell, 0.3, now, Timeframe::H1, &cfg), 0.0);
    }

    #[test]
    fn empty_tracker_is_neutral() {
        let tracker = DivergenceTracker::new();
        let cfg = DivergenceConfig::default();
        assert_eq!(tracker.directional_score(TradeDirection::Buy, t0(), Timeframe::H1, &cfg), 50.0);
        assert!(!tracker.is_expired(t0(), Timeframe::H1, &cfg));
    }
}
