//! CSV replay through one `InstrumentCore` with a paper book.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use tracing::{info, warn};

use tradegate_core::domain::{Bar, Instrument, MaSlot, Timeframe, TradeDirection};
use tradegate_core::execution::{ExecutionView, PaperBook};
use tradegate_core::market::SeriesStore;
use tradegate_core::validation::ValidationOutcome;
use tradegate_core::{InstrumentCore, StatusSnapshot, StrategyConfig};

/// One exported bar with its indicator values. Empty indicator cells are
/// treated as missing.
#[derive(Debug, Clone, Deserialize)]
pub struct Row {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub spread: Option<f64>,
    pub ma_very_fast: Option<f64>,
    pub ma_fast: Option<f64>,
    pub ma_medium: Option<f64>,
    pub ma_slow: Option<f64>,
    pub oscillator: Option<f64>,
}

impl Row {
    fn bar(&self) -> Bar {
        Bar {
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

pub fn read_rows<R: Read>(reader: R) -> Result<Vec<Row>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for (i, record) in csv.deserialize::<Row>().enumerate() {
        let row = record.with_context(|| format!("CSV row {}", i + 1))?;
        if !row.bar().is_sane() {
            bail!("CSV row {}: inconsistent OHLC at {}", i + 1, row.timestamp);
        }
        rows.push(row);
    }
    for pair in rows.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            bail!(
                "timestamps must be strictly increasing ({} then {})",
                pair[0].timestamp,
                pair[1].timestamp
            );
        }
    }
    Ok(rows)
}

/// Load rows into a store for `symbol` on `timeframe`.
pub fn build_store(rows: &[Row], symbol: &str, timeframe: Timeframe) -> SeriesStore {
    let missing = |v: Option<f64>| v.unwrap_or(f64::NAN);
    let mut store = SeriesStore::new();
    store.insert_bars(symbol, timeframe, rows.iter().map(Row::bar).collect());
    let columns: [(MaSlot, fn(&Row) -> Option<f64>); 4] = [
        (MaSlot::VeryFast, |r| r.ma_very_fast),
        (MaSlot::Fast, |r| r.ma_fast),
        (MaSlot::Medium, |r| r.ma_medium),
        (MaSlot::Slow, |r| r.ma_slow),
    ];
    for (slot, column) in columns {
        store.insert_average(symbol, timeframe, slot, rows.iter().map(|r| missing(column(r))).collect());
    }
    store.insert_oscillator(symbol, timeframe, rows.iter().map(|r| missing(r.oscillator)).collect());
    store
}

/// One accepted entry.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayEntry {
    pub at: DateTime<Utc>,
    pub direction: TradeDirection,
    pub price: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub symbol: String,
    pub fingerprint: String,
    pub updates: usize,
    pub passes: usize,
    pub entries: Vec<ReplayEntry>,
    pub rejections: BTreeMap<String, usize>,
    pub override_activations: u32,
    pub notices: Vec<String>,
    pub final_equity: f64,
    pub status: StatusSnapshot,
}

pub struct ReplayOptions {
    pub symbol: String,
    pub point: f64,
    pub equity: f64,
    pub units: f64,
}

/// Replay every row: refresh permissions, validate each permitted direction
/// and open (or reverse) on a pass.
pub fn run(rows: &[Row], config: &StrategyConfig, opts: &ReplayOptions) -> Result<ReplaySummary> {
    if rows.is_empty() {
        bail!("no rows to replay");
    }
    let symbol = opts.symbol.as_str();
    let timeframe = config.timeframes.entry;
    if config.timeframes.tracking != timeframe || config.timeframes.alignment.iter().any(|&t| t != timeframe) {
        warn!(
            %timeframe,
            "replay data has a single timeframe; other configured timeframes read as missing"
        );
    }

    let mut store = build_store(rows, symbol, timeframe);
    let mut book = PaperBook::new(opts.equity);
    let mut core = InstrumentCore::new(Instrument::new(symbol, opts.point), config);

    let mut entries = Vec::new();
    let mut rejections = BTreeMap::new();
    let mut notices = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        store.set_cursor(symbol, i);
        if let Some(spread) = row.spread {
            store.set_spread(symbol, spread);
        }
        let now = row.timestamp;
        book.observe_time(now);

        let mut permission = core.on_market_update(&store, &book, now);
        for direction in [TradeDirection::Buy, TradeDirection::Sell] {
            if !permission.allows(direction) {
                continue;
            }
            match core.validate_entry(direction, &store, &book, now) {
                ValidationOutcome::Passed(assessment) => {
                    info!(
                        %now,
                        %direction,
                        setup = %assessment.setup,
                        score = assessment.score,
                        price = row.close,
                        "entry"
                    );
                    book.open(symbol, direction, opts.units, row.close, now);
                    if let Some(notice) = core.record_trade(direction, &store, now) {
                        notices.push(notice);
                    }
                    entries.push(ReplayEntry {
                        at: now,
                        direction,
                        price: row.close,
                        score: assessment.score,
                    });
                    // the new position narrows what the next direction may do
                    permission = core.on_market_update(&store, &book, now);
                }
                ValidationOutcome::Rejected(rejection) => {
                    *rejections.entry(rejection.gate.to_string()).or_insert(0) += 1;
                }
            }
        }
    }

    Ok(ReplaySummary {
        symbol: symbol.to_string(),
        fingerprint: config.fingerprint()?,
        updates: rows.len(),
        passes: entries.len(),
        entries,
        rejections,
        override_activations: core.direction_override().activations(),
        notices,
        final_equity: book.equity(),
        status: core.status(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "timestamp,open,high,low,close,volume,spread,ma_very_fast,ma_fast,ma_medium,ma_slow,oscillator\n";

    fn csv_text(n: usize) -> String {
        let mut text = HEADER.to_string();
        for i in 0..n {
            let c = 1.1000 + (i as f64 * 0.5).sin() * 0.0020 + i as f64 * 0.0001;
            let osc = 50.0 + (i as f64 * 0.5).sin() * 20.0;
            text.push_str(&format!(
                "2024-03-04T{:02}:00:00Z,{c},{},{},{c},100,0.0001,{},{},{},{},{osc}\n",
                i % 24,
                c + 0.0003,
                c - 0.0003,
                c + 0.0006,
                c + 0.0003,
                c - 0.0002,
                c - 0.0008,
            ));
        }
        text
    }

    #[test]
    fn reads_rows_with_empty_indicators() {
        let text = format!("{HEADER}2024-01-02T00:00:00Z,1.1,1.2,1.0,1.15,10,,,,,,\n");
        let rows = read_rows(text.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].ma_fast.is_none());
        assert!(rows[0].spread.is_none());
    }

    #[test]
    fn rejects_out_of_order_rows() {
        let text = format!(
            "{HEADER}2024-01-02T01:00:00Z,1,1,1,1,1,,,,,,\n2024-01-02T00:00:00Z,1,1,1,1,1,,,,,,\n"
        );
        assert!(read_rows(text.as_bytes()).is_err());
    }

    #[test]
    fn replays_a_day() {
        let rows = read_rows(csv_text(24).as_bytes()).unwrap();
        let opts = ReplayOptions {
            symbol: "EURUSD".into(),
            point: 0.0001,
            equity: 10_000.0,
            units: 1_000.0,
        };
        let summary = run(&rows, &StrategyConfig::default(), &opts).unwrap();
        assert_eq!(summary.updates, 24);
        assert_eq!(summary.status.symbol, "EURUSD");
        assert_eq!(summary.fingerprint.len(), 64);
        assert!(summary.passes <= 24);
    }

    #[test]
    fn rejects_inconsistent_bars() {
        let text = format!("{HEADER}2024-01-02T00:00:00Z,1.1,1.0,1.2,1.15,10,,,,,,\n");
        let err = read_rows(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("CSV row 1"));
    }

    #[test]
    fn entry_never_reverses_within_one_row() {
        let rows = read_rows(csv_text(24).as_bytes()).unwrap();
        let mut config = StrategyConfig::default();
        config.validation.max_trades_per_bar = 2;
        config.validation.one_trade_per_entry_bar = false;
        let opts = ReplayOptions {
            symbol: "EURUSD".into(),
            point: 0.0001,
            equity: 10_000.0,
            units: 1_000.0,
        };
        let summary = run(&rows, &config, &opts).unwrap();
        assert_eq!(summary.passes, summary.entries.len());
        for pair in summary.entries.windows(2) {
            if pair[0].at == pair[1].at {
                assert_eq!(pair[0].direction, pair[1].direction);
            }
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        let opts = ReplayOptions {
            symbol: "EURUSD".into(),
            point: 0.0001,
            equity: 10_000.0,
            units: 1.0,
        };
        assert!(run(&[], &StrategyConfig::default(), &opts).is_err());
    }
}
