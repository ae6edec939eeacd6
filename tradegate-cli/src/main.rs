//! TradeGate CLI: replay and configuration commands.
//!
//! Commands:
//! - `replay`: feed a CSV indicator export through the decision core
//! - `check-config`: validate a TOML config and show resolved settings
//! - `default-config`: print the default configuration as TOML

mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tradegate_core::domain::{Instrument, Timeframe};
use tradegate_core::StrategyConfig;

use crate::replay::{ReplayOptions, ReplaySummary};

#[derive(Parser)]
#[command(
    name = "tradegate",
    about = "TradeGate CLI: divergence, alignment and validation gates for trade entries"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a CSV export bar by bar through the decision core.
    Replay {
        /// CSV with timestamp,open,high,low,close,volume,spread,ma_very_fast,ma_fast,ma_medium,ma_slow,oscillator.
        #[arg(long)]
        data: PathBuf,

        /// Instrument symbol.
        #[arg(long)]
        symbol: String,

        /// Strategy config TOML. Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Timeframe of the CSV bars; overrides the configured timeframes.
        #[arg(long, default_value = "H1")]
        timeframe: Timeframe,

        /// Point size (smallest price increment).
        #[arg(long, default_value_t = 0.0001)]
        point: f64,

        /// Starting equity of the paper book.
        #[arg(long, default_value_t = 10_000.0)]
        equity: f64,

        /// Units per entry.
        #[arg(long, default_value_t = 1_000.0)]
        units: f64,

        /// Print the summary as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Validate a config file and print resolved settings for a symbol.
    CheckConfig {
        /// Path to the TOML config.
        path: PathBuf,

        /// Symbol whose settings to resolve.
        #[arg(long, default_value = "EURUSD")]
        symbol: String,

        /// Point size for the symbol.
        #[arg(long, default_value_t = 0.0001)]
        point: f64,
    },
    /// Print the default configuration.
    DefaultConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            data,
            symbol,
            config,
            timeframe,
            point,
            equity,
            units,
            json,
        } => run_replay(
            &data,
            config.as_deref(),
            timeframe,
            ReplayOptions {
                symbol,
                point,
                equity,
                units,
            },
            json,
        ),
        Commands::CheckConfig {
            path,
            symbol,
            point,
        } => run_check_config(&path, &symbol, point),
        Commands::DefaultConfig => {
            print!("{}", StrategyConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<StrategyConfig> {
    match path {
        Some(p) => StrategyConfig::from_file(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(StrategyConfig::default()),
    }
}

fn run_replay(
    data: &Path,
    config_path: Option<&Path>,
    timeframe: Timeframe,
    opts: ReplayOptions,
    json: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    // the CSV carries one timeframe
    config.timeframes.entry = timeframe;
    config.timeframes.tracking = timeframe;
    config.timeframes.alignment = vec![timeframe];

    let file = File::open(data).with_context(|| format!("opening {}", data.display()))?;
    let rows = replay::read_rows(file)?;
    tracing::info!(rows = rows.len(), symbol = %opts.symbol, "replay started");

    let summary = replay::run(&rows, &config, &opts)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn run_check_config(path: &Path, symbol: &str, point: f64) -> Result<()> {
    let config = load_config(Some(path))?;
    let instrument = Instrument::new(symbol, point);
    println!("Config OK: {}", path.display());
    println!("Fingerprint: {}", config.fingerprint()?);
    println!("Symbol class: {:?}", instrument.class);
    println!("{}", serde_json::to_string_pretty(&config.settings_for(&instrument))?);
    Ok(())
}

fn print_summary(s: &ReplaySummary) {
    println!();
    println!("=== Replay Result ===");
    println!("Symbol:         {}", s.symbol);
    println!("Config:         {}", &s.fingerprint[..12.min(s.fingerprint.len())]);
    println!("Updates:        {}", s.updates);
    println!("Entries:        {}", s.passes);
    println!("Overrides:      {}", s.override_activations);
    println!("Final equity:   {:.2}", s.final_equity);
    println!();
    println!("--- Rejections by gate ---");
    if s.rejections.is_empty() {
        println!("(none)");
    }
    for (gate, count) in &s.rejections {
        println!("{gate:<14}  {count}");
    }
    if !s.notices.is_empty() {
        println!();
        println!("--- Override notices ---");
        for n in &s.notices {
            println!("{n}");
        }
    }
    println!();
    println!("{}", s.status);
}
