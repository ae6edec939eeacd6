//! The four moving averages the alignment and trend logic read.

use serde::{Deserialize, Serialize};

/// Role of a moving average, from shortest to longest period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaSlot {
    VeryFast,
    Fast,
    Medium,
    Slow,
}

impl MaSlot {
    pub const ALL: [MaSlot; 4] = [MaSlot::VeryFast, MaSlot::Fast, MaSlot::Medium, MaSlot::Slow];
}

/// Point-in-time values of the four averages on one timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaSnapshot {
    pub very_fast: f64,
    pub fast: f64,
    pub medium: f64,
    pub slow: f64,
}

/// Signed gaps between adjacent averages, in points.
///
/// Positive values mean the shorter average sits above the longer one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaGaps {
    pub very_fast_fast: f64,
    pub fast_medium: f64,
    pub medium_slow: f64,
}

impl MaSnapshot {
    pub fn get(&self, slot: MaSlot) -> f64 {
        match slot {
            MaSlot::VeryFast => self.very_fast,
            MaSlot::Fast => self.fast,
            MaSlot::Medium => self.medium,
            MaSlot::Slow => self.slow,
        }
    }

    pub fn is_finite(&self) -> bool {
        MaSlot::ALL.iter().all(|&s| self.get(s).is_finite())
    }

    /// Gaps in points for the given point size.
    pub fn gaps(&self, point: f64) -> MaGaps {
        let scale = if point > 0.0 { 1.0 / point } else { 1.0 };
        MaGaps {
            very_fast_fast: (self.very_fast - self.fast) * scale,
            fast_medium: (self.fast - self.medium) * scale,
            medium_slow: (self.medium - self.slow) * scale,
        }
    }
}
