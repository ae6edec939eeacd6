use serde::{Deserialize, Serialize};

/// Broad instrument family. Validation thresholds are widened per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolClass {
    Major,
    YenCross,
    Metal,
    Index,
    Crypto,
    Other,
}

const METAL_PREFIXES: [&str; 4] = ["XAU", "XAG", "XPT", "XPD"];
const CRYPTO_PREFIXES: [&str; 5] = ["BTC", "ETH", "LTC", "XRP", "SOL"];
const INDEX_NAMES: [&str; 8] = ["US30", "US500", "NAS100", "SPX", "GER40", "DE40", "UK100", "JP225"];
const CURRENCIES: [&str; 8] = ["USD", "EUR", "GBP", "JPY", "CHF", "AUD", "NZD", "CAD"];

impl SymbolClass {
    /// Classify a broker symbol. Suffixes such as `.m` or `-pro` are ignored.
    pub fn classify(symbol: &str) -> Self {
        let upper = symbol.to_ascii_uppercase();
        let core: String = upper
            .split(['.', '-', '_'])
            .next()
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        if METAL_PREFIXES.iter().any(|p| core.starts_with(p)) || core.starts_with("GOLD") {
            return SymbolClass::Metal;
        }
        if CRYPTO_PREFIXES.iter().any(|p| core.starts_with(p)) {
            return SymbolClass::Crypto;
        }
        if INDEX_NAMES.iter().any(|n| core.starts_with(n)) {
            return SymbolClass::Index;
        }
        if core.len() == 6 {
            let (base, quote) = core.split_at(3);
            if CURRENCIES.contains(&base) && CURRENCIES.contains(&quote) {
                return if base == "JPY" || quote == "JPY" {
                    SymbolClass::YenCross
                } else {
                    SymbolClass::Major
                };
            }
        }
        SymbolClass::Other
    }
}

/// Instrument metadata needed to express price distances in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    /// Smallest quoted price increment (e.g. 0.00001 for EURUSD, 0.01 for XAUUSD).
    pub point: f64,
    pub class: SymbolClass,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, point: f64) -> Self {
        let symbol = symbol.into();
        let class = SymbolClass::classify(&symbol);
        Self { symbol, point, class }
    }

    /// Convert a price distance into points. A non-positive point size
    /// leaves the distance unchanged.
    pub fn to_points(&self, price_distance: f64) -> f64 {
        if self.point > 0.0 {
            price_distance / self.point
        } else {
            price_distance
        }
    }
}
