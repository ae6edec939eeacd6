//! The four weighted sub-rules. Each maps signed gaps (points, positive =
//! in favour of the requested direction) to a 0..=100 score.

use serde::{Deserialize, Serialize};

use crate::domain::{MaGaps, TradeDirection};

/// Banded thresholds in points, strictly descending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
}

impl Bands {
    pub fn is_descending(&self) -> bool {
        self.excellent > self.good && self.good > self.fair && self.fair > 0.0
    }
}

/// Per-rule scores for one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleBreakdown {
    pub separation: f64,
    pub direction: f64,
    pub momentum: f64,
    pub stack: f64,
}

/// Gaps re-signed so that positive means "supports `direction`".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectedGaps {
    pub very_fast_fast: f64,
    pub fast_medium: f64,
    pub medium_slow: f64,
}

impl DirectedGaps {
    pub fn new(gaps: &MaGaps, direction: TradeDirection) -> Self {
        let s = direction.sign();
        Self {
            very_fast_fast: gaps.very_fast_fast * s,
            fast_medium: gaps.fast_medium * s,
            medium_slow: gaps.medium_slow * s,
        }
    }
}

/// Wider medium/slow separation in the trade's favour scores higher.
pub fn separation(medium_slow: f64, bands: &Bands) -> f64 {
    if medium_slow >= bands.excellent {
        100.0
    } else if medium_slow >= bands.good {
        75.0
    } else if medium_slow >= bands.fair {
        50.0
    } else if medium_slow > 0.0 {
        25.0
    } else {
        0.0
    }
}

/// Medium on the correct side of slow; a narrow band around zero gets partial credit.
pub fn direction(medium_slow: f64, close_band: f64) -> f64 {
    if medium_slow >= close_band {
        100.0
    } else if medium_slow.abs() < close_band {
        50.0
    } else {
        0.0
    }
}

/// Fast vs medium. Slightly on the wrong side still earns pullback credit.
pub fn momentum(fast_medium: f64, bands: &Bands, pullback_band: f64) -> f64 {
    if fast_medium >= bands.excellent {
        100.0
    } else if fast_medium >= bands.good {
        80.0
    } else if fast_medium >= bands.fair {
        60.0
    } else if fast_medium > 0.0 {
        40.0
    } else if fast_medium > -pullback_band {
        20.0
    } else {
        0.0
    }
}

/// Ordering of all four averages. The slower pairs weigh more.
pub fn stack(gaps: &DirectedGaps) -> f64 {
    let a = gaps.very_fast_fast > 0.0;
    let b = gaps.fast_medium > 0.0;
    let c = gaps.medium_slow > 0.0;
    match (a, b, c) {
        (true, true, true) => 100.0,
        (false, true, true) => 70.0,
        (true, true, false) => 50.0,
        (true, false, true) => 40.0,
        (false, false, true) => 35.0,
        (true, false, false) | (false, true, false) => 20.0,
        (false, false, false) => 0.0,
    }
}
