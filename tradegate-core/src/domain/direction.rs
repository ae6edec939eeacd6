//! Trade and position direction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a prospective entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn opposite(self) -> Self {
        match self {
            TradeDirection::Buy => TradeDirection::Sell,
            TradeDirection::Sell => TradeDirection::Buy,
        }
    }

    /// +1.0 for buys, -1.0 for sells. Multiplying a signed gap by this
    /// turns "in favour of the trade" into a positive number.
    pub fn sign(self) -> f64 {
        match self {
            TradeDirection::Buy => 1.0,
            TradeDirection::Sell => -1.0,
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Buy => f.write_str("buy"),
            TradeDirection::Sell => f.write_str("sell"),
        }
    }
}

/// Net position direction as reported by the execution side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PositionDirection {
    #[default]
    Flat,
    Long,
    Short,
}

impl PositionDirection {
    pub fn is_flat(self) -> bool {
        matches!(self, PositionDirection::Flat)
    }

    /// True when the position is open in the same direction as `trade`.
    pub fn matches(self, trade: TradeDirection) -> bool {
        matches!(
            (self, trade),
            (PositionDirection::Long, TradeDirection::Buy)
                | (PositionDirection::Short, TradeDirection::Sell)
        )
    }

    /// True when the position is open against `trade`. Flat never contradicts.
    pub fn contradicts(self, trade: TradeDirection) -> bool {
        !self.is_flat() && !self.matches(trade)
    }

    pub fn from_trade(trade: TradeDirection) -> Self {
        match trade {
            TradeDirection::Buy => PositionDirection::Long,
            TradeDirection::Sell => PositionDirection::Short,
        }
    }
}

impl fmt::Display for PositionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionDirection::Flat => f.write_str("flat"),
            PositionDirection::Long => f.write_str("long"),
            PositionDirection::Short => f.write_str("short"),
        }
    }
}
