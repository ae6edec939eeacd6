//! Regular and hidden divergence classification on the latest swing pairs.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::swing::{SwingPoint, SwingSet};

use super::{strength_for_score, DivergenceCategory, DivergenceConfig, DivergenceDirection, DivergenceSignal};

/// Classify the latest two peaks and the latest two troughs.
///
/// Evaluation order: regular bearish, regular bullish, hidden bearish, hidden
/// bullish. The first match is returned, so a regular divergence always wins
/// over a hidden one found in the same pass. Returns `None` when no pattern
/// matches or fewer than two swings of a kind exist.
pub fn classify(
    swings: &SwingSet,
    config: &DivergenceConfig,
    now: DateTime<Utc>,
) -> Option<DivergenceSignal> {
    let peaks = swings.last_two_peaks();
    let troughs = swings.last_two_troughs();

    // Regular bearish: higher high in price, lower high in the oscillator.
    if let Some((latest, previous)) = peaks {
        if latest.price > previous.price && latest.oscillator < previous.oscillator {
            let change = oscillator_change_pct(previous.oscillator, latest.oscillator);
            let score = regular_score(change, config);
            return Some(build(latest, DivergenceDirection::Bearish, DivergenceCategory::Regular, score, now));
        }
    }

    // Regular bullish: lower low in price, higher low in the oscillator.
    if let Some((latest, previous)) = troughs {
        if latest.price < previous.price && latest.oscillator > previous.oscillator {
            let change = oscillator_change_pct(previous.oscillator, latest.oscillator);
            let score = regular_score(change, config);
            return Some(build(latest, DivergenceDirection::Bullish, DivergenceCategory::Regular, score, now));
        }
    }

    let hidden = config.hidden_score.clamp(0.0, config.max_score.max(0.0));

    // Hidden bearish: lower high in price, higher high in the oscillator.
    if let Some((latest, previous)) = peaks {
        if latest.price < previous.price && latest.oscillator > previous.oscillator {
            return Some(build(latest, DivergenceDirection::Bearish, DivergenceCategory::Hidden, hidden, now));
        }
    }

    // Hidden bullish: higher low in price, lower low in the oscillator.
    if let Some((latest, previous)) = troughs {
        if latest.price > previous.price && latest.oscillator < previous.oscillator {
            return Some(build(latest, DivergenceDirection::Bullish, DivergenceCategory::Hidden, hidden, now));
        }
    }

    None
}

/// Absolute percent change of the oscillator between two swings.
///
/// Falls back to the raw difference when the earlier reading is zero.
fn oscillator_change_pct(previous: f64, latest: f64) -> f64 {
    let diff = (latest - previous).abs();
    if previous.abs() > f64::EPSILON {
        diff / previous.abs() * 100.0
    } else {
        diff
    }
}

fn regular_score(change_pct: f64, config: &DivergenceConfig) -> f64 {
    let raw = change_pct * config.score_multiplier;
    if raw.is_finite() {
        raw.clamp(0.0, config.max_score.max(0.0))
    } else {
        0.0
    }
}

fn build(
    swing: &SwingPoint,
    direction: DivergenceDirection,
    category: DivergenceCategory,
    score: f64,
    now: DateTime<Utc>,
) -> DivergenceSignal {
    debug!(
        ?direction,
        ?category,
        score,
        price = swing.price,
        oscillator = swing.oscillator,
        "divergence classified"
    );
    DivergenceSignal {
        direction,
        category,
        timestamp: swing.timestamp,
        price: swing.price,
        oscillator: swing.oscillator,
        strength: strength_for_score(score),
        confirmations: 1,
        score,
        first_detected: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swing::SwingKind;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
    }

    fn point(kind: SwingKind, offset: usize, price: f64, osc: f64) -> SwingPoint {
        SwingPoint {
            timestamp: now() - Duration::hours(offset as i64),
            price,
            oscillator: osc,
            kind,
            offset,
            strength: 1,
        }
    }

    fn set(peaks: &[(f64, f64)], troughs: &[(f64, f64)]) -> SwingSet {
        SwingSet {
            peaks: peaks
                .iter()
                .enumerate()
                .map(|(i, &(p, o))| point(SwingKind::Peak, 5 + i * 10, p, o))
                .collect(),
            troughs: troughs
                .iter()
                .enumerate()
                .map(|(i, &(p, o))| point(SwingKind::Trough, 4 + i * 10, p, o))
                .collect(),
        }
    }

    #[test]
    fn regular_bearish_scores_oscillator_drop() {
        // Higher high (1.20 > 1.10), oscillator 70 -> 63 = 10% drop, x5 = 50.
        let swings = set(&[(1.20, 63.0), (1.10, 70.0)], &[]);
        let sig = classify(&swings, &DivergenceConfig::default(), now()).unwrap();
        assert_eq!(sig.direction, DivergenceDirection::Bearish);
        assert_eq!(sig.category, DivergenceCategory::Regular);
        assert!((sig.score - 50.0).abs() < 1e-9);
        assert_eq!(sig.strength, 2);
        assert_eq!(sig.price, 1.20);
        assert_eq!(sig.confirmations, 1);
        assert_eq!(sig.first_detected, now());
    }

    #[test]
    fn regular_bullish_on_troughs() {
        // Lower low, higher oscillator low: 30 -> 36 = 20% rise, x5 = 100.
        let swings = set(&[], &[(1.05, 36.0), (1.08, 30.0)]);
        let sig = classify(&swings, &DivergenceConfig::default(), now()).unwrap();
        assert_eq!(sig.direction, DivergenceDirection::Bullish);
        assert_eq!(sig.category, DivergenceCategory::Regular);
        assert_eq!(sig.score, 100.0);
        assert_eq!(sig.strength, 3);
    }

    #[test]
    fn score_is_clamped_to_max() {
        let config = DivergenceConfig {
            max_score: 80.0,
            ..DivergenceConfig::default()
        };
        let swings = set(&[(1.30, 10.0), (1.10, 70.0)], &[]);
        let sig = classify(&swings, &config, now()).unwrap();
        assert_eq!(sig.score, 80.0);
    }

    #[test]
    fn hidden_bearish_gets_fixed_score() {
        // Lower high in price, higher high in oscillator.
        let swings = set(&[(1.10, 72.0), (1.20, 65.0)], &[]);
        let sig = classify(&swings, &DivergenceConfig::default(), now()).unwrap();
        assert_eq!(sig.category, DivergenceCategory::Hidden);
        assert_eq!(sig.direction, DivergenceDirection::Bearish);
        assert_eq!(sig.score, 40.0);
    }

    #[test]
    fn hidden_bullish_on_troughs() {
        // Higher low in price, lower low in oscillator.
        let swings = set(&[], &[(1.10, 25.0), (1.05, 30.0)]);
        let sig = classify(&swings, &DivergenceConfig::default(), now()).unwrap();
        assert_eq!(sig.category, DivergenceCategory::Hidden);
        assert_eq!(sig.direction, DivergenceDirection::Bullish);
    }

    #[test]
    fn regular_takes_priority_over_hidden() {
        // Peaks form hidden bearish; troughs form regular bullish.
        let swings = set(&[(1.10, 72.0), (1.20, 65.0)], &[(1.00, 35.0), (1.02, 30.0)]);
        let sig = classify(&swings, &DivergenceConfig::default(), now()).unwrap();
        assert_eq!(sig.category, DivergenceCategory::Regular);
        assert_eq!(sig.direction, DivergenceDirection::Bullish);
    }

    #[test]
    fn no_divergence_when_price_and_oscillator_agree() {
        let swings = set(&[(1.20, 75.0), (1.10, 70.0)], &[(1.05, 28.0), (1.08, 30.0)]);
        assert!(classify(&swings, &DivergenceConfig::default(), now()).is_none());
    }

    #[test]
    fn single_swing_is_insufficient() {
        let swings = set(&[(1.20, 60.0)], &[(1.0, 30.0)]);
        assert!(classify(&swings, &DivergenceConfig::default(), now()).is_none());
    }

    #[test]
    fn zero_previous_oscillator_uses_raw_difference() {
        // MACD-style oscillator crossing zero: 0 -> -4, x5 = 20.
        let swings = set(&[(1.20, -4.0), (1.10, 0.0)], &[]);
        let sig = classify(&swings, &DivergenceConfig::default(), now()).unwrap();
        assert!((sig.score - 20.0).abs() < 1e-9);
    }
}
