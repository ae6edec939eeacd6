//! Closed set of reasons an entry can be refused.

use serde::{Deserialize, Serialize};

use crate::domain::TradeDirection;

use super::sensitivity::SetupKind;
use super::trend::TrendStrength;

/// The four pipeline stages, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValidationGate {
    BarLimit,
    Eligibility,
    Ranging,
    Sensitivity,
}

impl std::fmt::Display for ValidationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationGate::BarLimit => write!(f, "bar-limit"),
            ValidationGate::Eligibility => write!(f, "eligibility"),
            ValidationGate::Ranging => write!(f, "ranging"),
            ValidationGate::Sensitivity => write!(f, "sensitivity"),
        }
    }
}

/// Why an entry was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// Tracking bar time could not be read.
    BarTimeUnavailable,
    BarLimitReached { trades: u32, max: u32 },
    DirectionTradedThisBar(TradeDirection),
    InsufficientCapital { equity: f64, required: f64 },
    DailyLimitReached { trades: usize, max: usize },
    InstrumentInactive,
    InstrumentLimitReached { open: usize, max: usize },
    SpreadUnavailable,
    SpreadTooWide { spread_points: f64, max_points: f64 },
    EntryBarAlreadyTraded,
    InsufficientData(String),
    RangingMarket { spread_pct: f64, threshold_pct: f64 },
    AlignmentTooWeak { confidence: f64, threshold: f64, trend: TrendStrength },
    PriceWrongSideOfMedium { price: f64, medium: f64 },
    ScoreBelowThreshold { setup: SetupKind, score: f64, threshold: f64 },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::BarTimeUnavailable => write!(f, "tracking bar time unavailable"),
            RejectionReason::BarLimitReached { trades, max } => {
                write!(f, "bar trade limit reached ({trades}/{max})")
            }
            RejectionReason::DirectionTradedThisBar(dir) => {
                write!(f, "{dir} already traded on this bar")
            }
            RejectionReason::InsufficientCapital { equity, required } => write!(
                f,
                "insufficient capital for additional instrument (equity {equity:.2} < {required:.2})"
            ),
            RejectionReason::DailyLimitReached { trades, max } => {
                write!(f, "daily trade limit reached ({trades}/{max})")
            }
            RejectionReason::InstrumentInactive => write!(f, "instrument not in active set"),
            RejectionReason::InstrumentLimitReached { open, max } => {
                write!(f, "instrument position limit reached ({open}/{max})")
            }
            RejectionReason::SpreadUnavailable => write!(f, "spread unavailable"),
            RejectionReason::SpreadTooWide { spread_points, max_points } => write!(
                f,
                "spread too wide ({spread_points:.1} > {max_points:.1} pts)"
            ),
            RejectionReason::EntryBarAlreadyTraded => write!(f, "entry bar already traded"),
            RejectionReason::InsufficientData(what) => write!(f, "insufficient data: {what}"),
            RejectionReason::RangingMarket { spread_pct, threshold_pct } => write!(
                f,
                "ranging market (MA spread {spread_pct:.3}% < {threshold_pct:.3}%)"
            ),
            RejectionReason::AlignmentTooWeak { confidence, threshold, trend } => write!(
                f,
                "alignment {confidence:.1} below {threshold:.1} for {trend} trend"
            ),
            RejectionReason::PriceWrongSideOfMedium { price, medium } => write!(
                f,
                "price {price} on wrong side of medium MA {medium}"
            ),
            RejectionReason::ScoreBelowThreshold { setup, score, threshold } => write!(
                f,
                "{setup} score {score:.1} below {threshold:.1}"
            ),
        }
    }
}

/// A failed gate and its reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub gate: ValidationGate,
    pub reason: RejectionReason,
}

impl Rejection {
    pub fn new(gate: ValidationGate, reason: RejectionReason) -> Self {
        Self { gate, reason }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.gate, self.reason)
    }
}
