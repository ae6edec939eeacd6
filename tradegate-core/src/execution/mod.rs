//! Execution collaborator interface.
//!
//! Order placement and position bookkeeping live outside the decision core.
//! The core only reads the state below, and hands back an allow-buy/allow-sell
//! pair plus a validation verdict that must be consulted before any order.

pub mod paper_book;

use crate::domain::PositionDirection;

pub use paper_book::{PaperBook, PaperPosition};

/// Read-only view of the account and open positions.
pub trait ExecutionView {
    /// Current net direction for `symbol`.
    fn position_direction(&self, symbol: &str) -> PositionDirection;

    /// Number of open positions on `symbol`.
    fn open_positions(&self, symbol: &str) -> usize;

    /// Number of distinct instruments with an open position.
    fn open_instruments(&self) -> usize;

    fn equity(&self) -> f64;

    /// Entries opened since the start of the current trading day.
    fn trades_today(&self) -> usize;

    /// Realized profit accumulated on `symbol`.
    fn realized_profit(&self, symbol: &str) -> f64;
}
