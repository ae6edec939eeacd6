//! Domain types shared by every decision component.

pub mod bar;
pub mod direction;
pub mod instrument;
pub mod ma;
pub mod timeframe;

pub use bar::Bar;
pub use direction::{PositionDirection, TradeDirection};
pub use instrument::{Instrument, SymbolClass};
pub use ma::{MaGaps, MaSlot, MaSnapshot};
pub use timeframe::{Timeframe, TimeframeParseError};
