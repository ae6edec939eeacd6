//! Direction permission and the divergence-driven override.
//!
//! Normally a held position only allows entries in its own direction. A
//! strong divergence that disagrees with the position (or arrives while
//! flat) activates an override that forces its implied direction until the
//! execution side reports a realized flip into that direction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::divergence::DivergenceSignal;
use crate::domain::{PositionDirection, TradeDirection};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideConfig {
    /// Minimum divergence score that activates the override.
    pub activation_threshold: f64,
    /// Emit a status notice every this many trades while active.
    pub notice_every_trades: u32,
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            activation_threshold: 60.0,
            notice_every_trades: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveOverride {
    pub forced: TradeDirection,
    pub reason: String,
    /// When the override was switched on.
    pub since: DateTime<Utc>,
    /// Timestamp of the divergence that switched it on.
    pub signal_time: DateTime<Utc>,
    pub trade_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum OverrideState {
    #[default]
    Inactive,
    Active(ActiveOverride),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionSource {
    Override,
    Normal,
}

/// Allowed entry directions for the current update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionPermission {
    pub allow_buy: bool,
    pub allow_sell: bool,
    pub source: PermissionSource,
}

impl DirectionPermission {
    pub fn allows(&self, direction: TradeDirection) -> bool {
        match direction {
            TradeDirection::Buy => self.allow_buy,
            TradeDirection::Sell => self.allow_sell,
        }
    }

    fn forced(direction: TradeDirection) -> Self {
        Self {
            allow_buy: direction == TradeDirection::Buy,
            allow_sell: direction == TradeDirection::Sell,
            source: PermissionSource::Override,
        }
    }

    /// One direction at a time: a held position blocks the opposite side.
    pub fn normal(position: PositionDirection) -> Self {
        Self {
            allow_buy: position != PositionDirection::Short,
            allow_sell: position != PositionDirection::Long,
            source: PermissionSource::Normal,
        }
    }
}

impl std::fmt::Display for DirectionPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = match (self.allow_buy, self.allow_sell) {
            (true, true) => "buy+sell",
            (true, false) => "buy",
            (false, true) => "sell",
            (false, false) => "none",
        };
        let source = match self.source {
            PermissionSource::Override => "override",
            PermissionSource::Normal => "normal",
        };
        write!(f, "{side} ({source})")
    }
}

/// Override state machine for one instrument.
#[derive(Debug, Clone, Default)]
pub struct DirectionOverride {
    config: OverrideConfig,
    state: OverrideState,
    /// Kept across clears so an already-used signal cannot re-activate.
    last_signal_time: Option<DateTime<Utc>>,
    last_known_direction: Option<PositionDirection>,
    activations: u32,
}

impl DirectionOverride {
    pub fn new(config: OverrideConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &OverrideState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, OverrideState::Active(_))
    }

    pub fn forced_direction(&self) -> Option<TradeDirection> {
        match &self.state {
            OverrideState::Active(a) => Some(a.forced),
            OverrideState::Inactive => None,
        }
    }

    pub fn activations(&self) -> u32 {
        self.activations
    }

    pub fn last_signal_time(&self) -> Option<DateTime<Utc>> {
        self.last_signal_time
    }

    pub fn last_known_direction(&self) -> Option<PositionDirection> {
        self.last_known_direction
    }

    /// Compare the reported position with the last one seen.
    ///
    /// A change into the forced direction fulfils and clears an active
    /// override. Returns true when that happened.
    pub fn observe_position(&mut self, current: PositionDirection) -> bool {
        let previous = self.last_known_direction.replace(current);
        let changed = previous.is_some_and(|p| p != current);
        let Some(forced) = self.forced_direction() else {
            return false;
        };
        if !changed || !current.matches(forced) {
            return false;
        }
        if let OverrideState::Active(active) = &self.state {
            info!(
                %forced,
                trades = active.trade_count,
                "direction override fulfilled, position now {current}"
            );
        }
        self.state = OverrideState::Inactive;
        true
    }

    /// Activate on a qualifying divergence, then report allowed directions.
    pub fn evaluate(
        &mut self,
        signal: Option<&DivergenceSignal>,
        position: PositionDirection,
        now: DateTime<Utc>,
    ) -> DirectionPermission {
        if let Some(signal) = signal {
            if !self.is_active() && self.should_activate(signal, position) {
                self.activate(signal, position, now);
            }
        }
        match &self.state {
            OverrideState::Active(active) => DirectionPermission::forced(active.forced),
            OverrideState::Inactive => DirectionPermission::normal(position),
        }
    }

    fn should_activate(&self, signal: &DivergenceSignal, position: PositionDirection) -> bool {
        let strong = signal.score >= self.config.activation_threshold;
        let implied = signal.implied_trade();
        let position_allows = position.is_flat() || position.contradicts(implied);
        let newer = self.last_signal_time.map_or(true, |t| signal.timestamp > t);
        strong && position_allows && newer
    }

    fn activate(&mut self, signal: &DivergenceSignal, position: PositionDirection, now: DateTime<Utc>) {
        let forced = signal.implied_trade();
        let reason = format!(
            "{} {} divergence score {:.1} against {} position",
            signal.category, signal.direction, signal.score, position
        );
        info!(%forced, score = signal.score, %reason, "direction override activated");
        self.last_signal_time = Some(signal.timestamp);
        self.activations += 1;
        self.state = OverrideState::Active(ActiveOverride {
            forced,
            reason,
            since: now,
            signal_time: signal.timestamp,
            trade_count: 0,
        });
    }

    /// Count a trade taken while the override is active. Returns a status
    /// notice on every `notice_every_trades`-th trade.
    pub fn record_trade(&mut self) -> Option<String> {
        let every = self.config.notice_every_trades.max(1);
        let OverrideState::Active(active) = &mut self.state else {
            return None;
        };
        active.trade_count += 1;
        if active.trade_count % every != 0 {
            return None;
        }
        let notice = format!(
            "override forcing {} still active after {} trades ({})",
            active.forced, active.trade_count, active.reason
        );
        info!("{notice}");
        Some(notice)
    }

    /// Explicit clear. The last signal time is kept.
    pub fn clear(&mut self) {
        if self.is_active() {
            info!("direction override cleared");
        }
        self.state = OverrideState::Inactive;
    }
}
