//! Tracked instrument definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbols tracked by the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetSymbol {
    /// Spot gold against the dollar
    Xauusd,
    Eurusd,
    Gbpusd,
    Gbpeur,
}

impl AssetSymbol {
    /// Every tracked symbol, in display order
    pub const ALL: [AssetSymbol; 4] = [
        AssetSymbol::Xauusd,
        AssetSymbol::Eurusd,
        AssetSymbol::Gbpusd,
        AssetSymbol::Gbpeur,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetSymbol::Xauusd => "XAUUSD",
            AssetSymbol::Eurusd => "EURUSD",
            AssetSymbol::Gbpusd => "GBPUSD",
            AssetSymbol::Gbpeur => "GBPEUR",
        }
    }

    /// Get the full display name
    pub fn display_name(&self) -> &'static str {
        match self {
            AssetSymbol::Xauusd => "Gold / US Dollar",
            AssetSymbol::Eurusd => "Euro / US Dollar",
            AssetSymbol::Gbpusd => "British Pound / US Dollar",
            AssetSymbol::Gbpeur => "British Pound / Euro",
        }
    }

    pub fn instrument(&self) -> Instrument {
        Instrument {
            symbol: *self,
            name: self.display_name(),
        }
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AssetSymbol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Providers occasionally answer with "EUR/USD"
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_uppercase();

        AssetSymbol::ALL
            .into_iter()
            .find(|symbol| symbol.as_str() == normalized)
            .ok_or_else(|| format!("Unknown symbol: {}", s))
    }
}

/// A tracked instrument: symbol plus display name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Instrument {
    pub symbol: AssetSymbol,
    pub name: &'static str,
}

/// The fixed instrument set
pub fn instruments() -> Vec<Instrument> {
    AssetSymbol::ALL.iter().map(AssetSymbol::instrument).collect()
}

/// Comma separated symbol list for provider prompts
pub fn symbol_list() -> String {
    AssetSymbol::ALL
        .iter()
        .map(AssetSymbol::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
