//! In-memory market data with a replay cursor.
//!
//! Series are stored chronologically (index 0 = oldest). The cursor marks the
//! "latest" bar, so offset 0 resolves to `series[cursor]`, offset 1 to
//! `series[cursor - 1]` and so on. Values after the cursor are invisible, which
//! keeps replays free of look-ahead.

use crate::domain::{Bar, MaSlot, Timeframe};
use std::collections::HashMap;

use super::MarketData;

#[derive(Debug, Clone, Default)]
struct Series {
    bars: Vec<Bar>,
    averages: HashMap<MaSlot, Vec<f64>>,
    oscillator: Vec<f64>,
}

/// Container for per-(symbol, timeframe) series.
///
/// Every series of one (symbol, timeframe) is indexed by the same
/// chronological bar index.
#[derive(Debug, Clone, Default)]
pub struct SeriesStore {
    series: HashMap<(String, Timeframe), Series>,
    spreads: HashMap<String, f64>,
    /// Cursor per symbol. `None` means "latest element of each series".
    cursors: HashMap<String, usize>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, symbol: &str, timeframe: Timeframe) -> &mut Series {
        self.series
            .entry((symbol.to_string(), timeframe))
            .or_default()
    }

    pub fn insert_bars(&mut self, symbol: &str, timeframe: Timeframe, bars: Vec<Bar>) {
        self.entry(symbol, timeframe).bars = bars;
    }

    pub fn insert_average(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        slot: MaSlot,
        values: Vec<f64>,
    ) {
        self.entry(symbol, timeframe).averages.insert(slot, values);
    }

    pub fn insert_oscillator(&mut self, symbol: &str, timeframe: Timeframe, values: Vec<f64>) {
        self.entry(symbol, timeframe).oscillator = values;
    }

    pub fn set_spread(&mut self, symbol: &str, spread: f64) {
        self.spreads.insert(symbol.to_string(), spread);
    }

    /// Move the replay cursor for `symbol` to chronological index `index`.
    pub fn set_cursor(&mut self, symbol: &str, index: usize) {
        self.cursors.insert(symbol.to_string(), index);
    }

    /// A cursor past the end of `values` reads as missing rather than
    /// falling back to an older element.
    fn resolve<T: Clone>(&self, symbol: &str, values: &[T], offset: usize) -> Option<T> {
        let latest = match self.cursors.get(symbol) {
            Some(&cursor) => cursor,
            None => values.len().checked_sub(1)?,
        };
        latest
            .checked_sub(offset)
            .and_then(|i| values.get(i))
            .cloned()
    }

    fn series(&self, symbol: &str, timeframe: Timeframe) -> Option<&Series> {
        self.series.get(&(symbol.to_string(), timeframe))
    }
}

impl MarketData for SeriesStore {
    fn bar(&self, symbol: &str, timeframe: Timeframe, offset: usize) -> Option<Bar> {
        let s = self.series(symbol, timeframe)?;
        self.resolve(symbol, &s.bars, offset)
    }

    fn moving_average(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        slot: MaSlot,
        offset: usize,
    ) -> Option<f64> {
        let s = self.series(symbol, timeframe)?;
        let values = s.averages.get(&slot)?;
        self.resolve(symbol, values, offset).filter(|v| !v.is_nan())
    }

    fn oscillator(&self, symbol: &str, timeframe: Timeframe, offset: usize) -> Option<f64> {
        let s = self.series(symbol, timeframe)?;
        self.resolve(symbol, &s.oscillator, offset)
            .filter(|v| !v.is_nan())
    }

    fn spread(&self, symbol: &str) -> Option<f64> {
        self.spreads.get(symbol).copied()
    }
}
