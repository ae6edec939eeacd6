//! Minimal netting book used for replays and tests.
//!
//! One net position per symbol. Opening against an existing position closes
//! it first (realizing P&L) and then opens the new direction, which is how a
//! netting account reports a direction flip.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{PositionDirection, TradeDirection};

use super::ExecutionView;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperPosition {
    pub direction: TradeDirection,
    pub units: f64,
    pub entry_price: f64,
    pub opened_at: DateTime<Utc>,
}

impl PaperPosition {
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.entry_price) * self.units
    }
}

#[derive(Debug, Clone)]
pub struct PaperBook {
    positions: HashMap<String, PaperPosition>,
    realized: HashMap<String, f64>,
    starting_equity: f64,
    trades_today: usize,
    trading_day: Option<NaiveDate>,
}

impl PaperBook {
    pub fn new(starting_equity: f64) -> Self {
        Self {
            positions: HashMap::new(),
            realized: HashMap::new(),
            starting_equity,
            trades_today: 0,
            trading_day: None,
        }
    }

    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.trading_day != Some(today) {
            self.trading_day = Some(today);
            self.trades_today = 0;
        }
    }

    /// Open `units` in `direction`, closing any opposite position first.
    ///
    /// Adding in the same direction averages the entry price.
    pub fn open(
        &mut self,
        symbol: &str,
        direction: TradeDirection,
        units: f64,
        price: f64,
        now: DateTime<Utc>,
    ) {
        self.roll_day(now);
        if let Some(existing) = self.positions.get(symbol) {
            if existing.direction != direction {
                self.close(symbol, price);
            }
        }
        match self.positions.get_mut(symbol) {
            Some(pos) => {
                let total = pos.units + units;
                pos.entry_price = (pos.entry_price * pos.units + price * units) / total;
                pos.units = total;
            }
            None => {
                self.positions.insert(
                    symbol.to_string(),
                    PaperPosition {
                        direction,
                        units,
                        entry_price: price,
                        opened_at: now,
                    },
                );
            }
        }
        self.trades_today += 1;
    }

    /// Close the position on `symbol` at `price`. Returns the realized P&L.
    pub fn close(&mut self, symbol: &str, price: f64) -> Option<f64> {
        let pos = self.positions.remove(symbol)?;
        let pnl = pos.unrealized_pnl(price);
        *self.realized.entry(symbol.to_string()).or_insert(0.0) += pnl;
        Some(pnl)
    }

    pub fn position(&self, symbol: &str) -> Option<&PaperPosition> {
        self.positions.get(symbol)
    }

    /// Start a new trading day if `now` falls on a different date.
    pub fn observe_time(&mut self, now: DateTime<Utc>) {
        self.roll_day(now);
    }
}

impl ExecutionView for PaperBook {
    fn position_direction(&self, symbol: &str) -> PositionDirection {
        self.positions
            .get(symbol)
            .map_or(PositionDirection::Flat, |p| PositionDirection::from_trade(p.direction))
    }

    fn open_positions(&self, symbol: &str) -> usize {
        usize::from(self.positions.contains_key(symbol))
    }

    fn open_instruments(&self) -> usize {
        self.positions.len()
    }

    fn equity(&self) -> f64 {
        self.starting_equity + self.realized.values().sum::<f64>()
    }

    fn trades_today(&self) -> usize {
        self.trades_today
    }

    fn realized_profit(&self, symbol: &str) -> f64 {
        self.realized.get(symbol).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn opening_sets_direction() {
        let mut book = PaperBook::new(10_000.0);
        assert_eq!(book.position_direction("EURUSD"), PositionDirection::Flat);
        book.open("EURUSD", TradeDirection::Buy, 1.0, 1.10, t(4, 9));
        assert_eq!(book.position_direction("EURUSD"), PositionDirection::Long);
        assert_eq!(book.open_instruments(), 1);
        assert_eq!(book.trades_today(), 1);
    }

    #[test]
    fn opposite_open_flips_and_realizes() {
        let mut book = PaperBook::new(10_000.0);
        book.open("EURUSD", TradeDirection::Buy, 1000.0, 1.10, t(4, 9));
        book.open("EURUSD", TradeDirection::Sell, 1000.0, 1.12, t(4, 10));
        assert_eq!(book.position_direction("EURUSD"), PositionDirection::Short);
        assert!((book.realized_profit("EURUSD") - 20.0).abs() < 1e-9);
        assert!((book.equity() - 10_020.0).abs() < 1e-9);
    }

    #[test]
    fn same_direction_averages_entry() {
        let mut book = PaperBook::new(10_000.0);
        book.open("XAUUSD", TradeDirection::Buy, 1.0, 2000.0, t(4, 9));
        book.open("XAUUSD", TradeDirection::Buy, 1.0, 2010.0, t(4, 10));
        let pos = book.position("XAUUSD").unwrap();
        assert_eq!(pos.units, 2.0);
        assert!((pos.entry_price - 2005.0).abs() < 1e-9);
    }

    #[test]
    fn trades_today_resets_on_new_day() {
        let mut book = PaperBook::new(10_000.0);
        book.open("EURUSD", TradeDirection::Buy, 1.0, 1.10, t(4, 9));
        book.open("GBPUSD", TradeDirection::Buy, 1.0, 1.25, t(4, 10));
        assert_eq!(book.trades_today(), 2);
        book.observe_time(t(5, 0));
        assert_eq!(book.trades_today(), 0);
    }

    #[test]
    fn close_without_position_is_none() {
        let mut book = PaperBook::new(10_000.0);
        assert!(book.close("EURUSD", 1.1).is_none());
    }
}
