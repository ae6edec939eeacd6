//! Age decay for divergence scores.
//!
//! The stored score is never modified. Callers asking "how much does this
//! divergence matter now" get the stored score multiplied by the factor of
//! the age bucket the signal falls into.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBucket {
    Fresh,
    Recent,
    Aging,
    Old,
    VeryOld,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayBucket {
    /// Inclusive upper bound on age in bars.
    pub max_age_bars: i64,
    pub multiplier: f64,
}

/// Fresh / recent / aging / old bounds plus the very-old floor multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayTable {
    pub fresh: DecayBucket,
    pub recent: DecayBucket,
    pub aging: DecayBucket,
    pub old: DecayBucket,
    pub very_old_multiplier: f64,
}

impl Default for DecayTable {
    fn default() -> Self {
        Self {
            fresh: DecayBucket { max_age_bars: 3, multiplier: 1.0 },
            recent: DecayBucket { max_age_bars: 8, multiplier: 0.85 },
            aging: DecayBucket { max_age_bars: 15, multiplier: 0.65 },
            old: DecayBucket { max_age_bars: 30, multiplier: 0.40 },
            very_old_multiplier: 0.20,
        }
    }
}

impl DecayTable {
    pub fn bucket(&self, age_bars: i64) -> AgeBucket {
        if age_bars <= self.fresh.max_age_bars {
            AgeBucket::Fresh
        } else if age_bars <= self.recent.max_age_bars {
            AgeBucket::Recent
        } else if age_bars <= self.aging.max_age_bars {
            AgeBucket::Aging
        } else if age_bars <= self.old.max_age_bars {
            AgeBucket::Old
        } else {
            AgeBucket::VeryOld
        }
    }

    pub fn multiplier(&self, age_bars: i64) -> f64 {
        match self.bucket(age_bars) {
            AgeBucket::Fresh => self.fresh.multiplier,
            AgeBucket::Recent => self.recent.multiplier,
            AgeBucket::Aging => self.aging.multiplier,
            AgeBucket::Old => self.old.multiplier,
            AgeBucket::VeryOld => self.very_old_multiplier,
        }
    }

    fn ordered(&self) -> [DecayBucket; 4] {
        [self.fresh, self.recent, self.aging, self.old]
    }

    /// Bounds must ascend, multipliers must lie in [0, 1] and never increase with age.
    pub fn check(&self) -> Result<(), String> {
        let buckets = self.ordered();
        if buckets[0].max_age_bars < 0 {
            return Err("fresh bucket bound must be >= 0".into());
        }
        for pair in buckets.windows(2) {
            if pair[1].max_age_bars <= pair[0].max_age_bars {
                return Err(format!(
                    "bucket bounds must ascend ({} then {})",
                    pair[0].max_age_bars, pair[1].max_age_bars
                ));
            }
        }
        let mut multipliers: Vec<f64> = buckets.iter().map(|b| b.multiplier).collect();
        multipliers.push(self.very_old_multiplier);
        if multipliers.iter().any(|m| !(0.0..=1.0).contains(m)) {
            return Err("decay multipliers must lie in [0, 1]".into());
        }
        if multipliers.windows(2).any(|w| w[1] > w[0]) {
            return Err("decay multipliers must not increase with age".into());
        }
        Ok(())
    }
}
