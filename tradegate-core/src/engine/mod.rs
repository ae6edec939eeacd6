//! Per-instrument coordination of the decision components.
//!
//! Each update runs in dependency order: swing extraction, divergence
//! classification, position observation, then override evaluation. Entry
//! validation is a separate call made before any order.

pub mod instrument_core;
pub mod status;

pub use instrument_core::InstrumentCore;
pub use status::{DivergenceStatus, StatusSnapshot};
