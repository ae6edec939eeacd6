//! TradeGate Core: entry-permission decisions for one instrument at a time.
//!
//! This crate contains the decision core of a trend-following strategy:
//! - Domain types (bars, directions, instruments, moving-average snapshots)
//! - Swing-point extraction and price/oscillator divergence with age decay
//! - Four-rule moving-average alignment scoring
//! - A four-gate entry validation pipeline
//! - The divergence-driven direction override state machine
//! - `InstrumentCore`, which owns the per-instrument state and runs the above
//!   in dependency order
//!
//! Market data and execution state come in through the [`market::MarketData`]
//! and [`execution::ExecutionView`] traits. In-memory implementations of both
//! are provided for replays and tests.

pub mod alignment;
pub mod config;
pub mod direction;
pub mod divergence;
pub mod domain;
pub mod engine;
pub mod execution;
pub mod market;
pub mod swing;
pub mod validation;

pub use config::{ConfigError, StrategyConfig};
pub use engine::{InstrumentCore, StatusSnapshot};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: state and result types can move to a worker thread.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Instrument>();
        require_sync::<domain::Instrument>();
        require_send::<domain::MaSnapshot>();
        require_sync::<domain::MaSnapshot>();

        // Component state
        require_send::<divergence::DivergenceTracker>();
        require_sync::<divergence::DivergenceTracker>();
        require_send::<direction::DirectionOverride>();
        require_sync::<direction::DirectionOverride>();
        require_send::<validation::ValidationPipeline>();
        require_sync::<validation::ValidationPipeline>();
        require_send::<engine::InstrumentCore>();
        require_sync::<engine::InstrumentCore>();

        // Results
        require_send::<alignment::AlignmentScore>();
        require_sync::<alignment::AlignmentScore>();
        require_send::<validation::ValidationOutcome>();
        require_sync::<validation::ValidationOutcome>();
        require_send::<engine::StatusSnapshot>();
        require_sync::<engine::StatusSnapshot>();

        // Collaborators
        require_send::<market::SeriesStore>();
        require_sync::<market::SeriesStore>();
        require_send::<execution::PaperBook>();
        require_sync::<execution::PaperBook>();
        require_send::<config::StrategyConfig>();
        require_sync::<config::StrategyConfig>();
    }

    /// Architecture contract: the pipeline only reads market and execution
    /// state through the collaborator traits.
    #[test]
    fn collaborators_are_object_safe() {
        fn _check(
            core: &mut engine::InstrumentCore,
            market: &dyn market::MarketData,
            execution: &dyn execution::ExecutionView,
            now: chrono::DateTime<chrono::Utc>,
        ) -> direction::DirectionPermission {
            core.on_market_update(market, execution, now)
        }
    }
}
