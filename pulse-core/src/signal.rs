//! Signal types and the per-symbol signal board

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::instrument::AssetSymbol;

/// Placeholder price when the provider could not quote the instrument
pub const PRICE_UNAVAILABLE: &str = "N/A";

/// Maximum number of citation sources attached to a cycle
pub const MAX_CITATION_SOURCES: usize = 8;

/// Monthly sentiment classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl SignalType {
    pub fn label(&self) -> &'static str {
        match self {
            SignalType::StrongBuy => "STRONG BUY",
            SignalType::Buy => "BUY",
            SignalType::Neutral => "NEUTRAL",
            SignalType::Sell => "SELL",
            SignalType::StrongSell => "STRONG SELL",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for SignalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_uppercase()
            .replace(|c: char| c == '_' || c == '-', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        match normalized.as_str() {
            "STRONG BUY" => Ok(SignalType::StrongBuy),
            "BUY" => Ok(SignalType::Buy),
            "NEUTRAL" | "HOLD" => Ok(SignalType::Neutral),
            "SELL" => Ok(SignalType::Sell),
            "STRONG SELL" => Ok(SignalType::StrongSell),
            _ => Err(format!("Unknown signal classification: {}", s)),
        }
    }
}

/// A grounding reference the provider reported for a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationSource {
    pub title: String,
    pub uri: String,
}

/// Acquisition result for one instrument in one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: AssetSymbol,
    pub name: String,
    pub signal: SignalType,
    pub last_price: String,
    pub technical_summary: String,
    pub fundamental_summary: String,
    pub justification: String,
    pub sources: Vec<CitationSource>,
    pub acquired_at: DateTime<Utc>,
}

static ABSENT: SignalSlot = SignalSlot::Absent;

/// Signal state for one symbol
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "status", content = "signal", rename_all = "snake_case")]
pub enum SignalSlot {
    /// No successful acquisition yet
    #[default]
    Absent,
    Present(Signal),
}

impl SignalSlot {
    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            SignalSlot::Absent => None,
            SignalSlot::Present(signal) => Some(signal),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, SignalSlot::Present(_))
    }
}

/// Symbol to signal mapping holding exactly one slot per tracked symbol.
///
/// Keys are fixed at construction; only slot values can change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SignalBoard {
    slots: BTreeMap<AssetSymbol, SignalSlot>,
}

impl SignalBoard {
    /// Board with every tracked symbol absent
    pub fn new() -> Self {
        Self {
            slots: AssetSymbol::ALL
                .iter()
                .map(|symbol| (*symbol, SignalSlot::Absent))
                .collect(),
        }
    }

    pub fn get(&self, symbol: AssetSymbol) -> &SignalSlot {
        // Every symbol is seeded in new()
        self.slots.get(&symbol).unwrap_or(&ABSENT)
    }

    /// Replace the slot for `symbol` with a fresh signal
    pub fn set(&mut self, signal: Signal) {
        self.slots.insert(signal.symbol, SignalSlot::Present(signal));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetSymbol, &SignalSlot)> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn present_count(&self) -> usize {
        self.slots.values().filter(|slot| slot.is_present()).count()
    }
}

impl Default for SignalBoard {
    fn default() -> Self {
        Self::new()
    }
}
