//! Operator-facing projection of one instrument's decision state.
//!
//! Nothing here feeds back into decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::alignment::AlignmentBias;
use crate::direction::{DirectionPermission, OverrideState};
use crate::divergence::{DivergenceCategory, DivergenceDirection};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceStatus {
    pub direction: DivergenceDirection,
    pub category: DivergenceCategory,
    pub score: f64,
    pub decayed_score: f64,
    pub confirmations: u32,
    pub age_bars: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub symbol: String,
    pub at: Option<DateTime<Utc>>,
    pub divergence: Option<DivergenceStatus>,
    pub buy_alignment: f64,
    pub sell_alignment: f64,
    pub bias: Option<AlignmentBias>,
    pub alignment_warning: String,
    pub override_state: OverrideState,
    pub permission: Option<DirectionPermission>,
    pub trades_this_bar: u32,
    pub last_bar_time: Option<DateTime<Utc>>,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)?;
        if let Some(at) = self.at {
            write!(f, " @ {}", at.format("%Y-%m-%d %H:%M"))?;
        }

        match &self.divergence {
            Some(d) => write!(
                f,
                " | div {} {} {:.0} (decayed {:.0}, x{}, {} bars)",
                d.category, d.direction, d.score, d.decayed_score, d.confirmations, d.age_bars
            )?,
            None => write!(f, " | div none")?,
        }

        write!(f, " | align buy {:.0} sell {:.0}", self.buy_alignment, self.sell_alignment)?;
        if let Some(bias) = self.bias {
            write!(f, " ({bias})")?;
        }
        if !self.alignment_warning.is_empty() {
            write!(f, " !")?;
        }

        match &self.override_state {
            OverrideState::Active(a) => write!(f, " | override forcing {} ({} trades)", a.forced, a.trade_count)?,
            OverrideState::Inactive => write!(f, " | override off")?,
        }
        if let Some(p) = &self.permission {
            write!(f, " | allow {p}")?;
        }
        write!(f, " | bar trades {}", self.trades_this_bar)
    }
}
