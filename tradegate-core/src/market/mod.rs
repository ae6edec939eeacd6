//! Market-data collaborator interface.
//!
//! Indicator values are computed elsewhere. The decision core only asks for
//! point-in-time values addressed by (symbol, timeframe, offset), where offset 0
//! is the latest bar and larger offsets walk back in time.

pub mod store;

use crate::domain::{Bar, MaSlot, MaSnapshot, Timeframe};

pub use store::SeriesStore;

/// Read-only access to bars, moving averages, the oscillator and the spread.
///
/// Every accessor returns `None` when the value is not available; callers treat
/// that as insufficient data, never as an error.
pub trait MarketData {
    fn bar(&self, symbol: &str, timeframe: Timeframe, offset: usize) -> Option<Bar>;

    fn moving_average(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        slot: MaSlot,
        offset: usize,
    ) -> Option<f64>;

    fn oscillator(&self, symbol: &str, timeframe: Timeframe, offset: usize) -> Option<f64>;

    /// Current spread in price units.
    fn spread(&self, symbol: &str) -> Option<f64>;

    /// All four averages at `offset`, or `None` if any is missing or NaN.
    fn ma_snapshot(&self, symbol: &str, timeframe: Timeframe, offset: usize) -> Option<MaSnapshot> {
        let snap = MaSnapshot {
            very_fast: self.moving_average(symbol, timeframe, MaSlot::VeryFast, offset)?,
            fast: self.moving_average(symbol, timeframe, MaSlot::Fast, offset)?,
            medium: self.moving_average(symbol, timeframe, MaSlot::Medium, offset)?,
            slow: self.moving_average(symbol, timeframe, MaSlot::Slow, offset)?,
        };
        snap.is_finite().then_some(snap)
    }

    /// Open time of the bar at `offset`.
    fn bar_time(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        offset: usize,
    ) -> Option<chrono::DateTime<chrono::Utc>> {
        self.bar(symbol, timeframe, offset).map(|b| b.timestamp)
    }
}
