//! Per-bar trade counters for the tracking timeframe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::TradeDirection;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarTracker {
    pub last_bar_time: Option<DateTime<Utc>>,
    pub trades_this_bar: u32,
    pub buy_traded: bool,
    pub sell_traded: bool,
}

impl BarTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the counters when `bar_time` differs from the last seen bar.
    /// Returns true on a new bar.
    pub fn observe(&mut self, bar_time: DateTime<Utc>) -> bool {
        if self.last_bar_time == Some(bar_time) {
            return false;
        }
        self.last_bar_time = Some(bar_time);
        self.trades_this_bar = 0;
        self.buy_traded = false;
        self.sell_traded = false;
        true
    }

    pub fn traded(&self, direction: TradeDirection) -> bool {
        match direction {
            TradeDirection::Buy => self.buy_traded,
            TradeDirection::Sell => self.sell_traded,
        }
    }

    pub fn record(&mut self, direction: TradeDirection) {
        self.trades_this_bar += 1;
        match direction {
            TradeDirection::Buy => self.buy_traded = true,
            TradeDirection::Sell => self.sell_traded = true,
        }
    }
}
