//! Folds an acquired batch into the previous signal board

use chrono::{DateTime, Utc};
use pulse_core::{AssetSymbol, Signal, SignalBoard};
use pulse_intel::SignalBatch;
use tracing::debug;

/// Merge `batch` into a copy of `previous`.
///
/// Only symbols present in the batch are overwritten. Every new signal shares
/// the batch citation list and `acquired_at`. Reports for symbols outside the
/// instrument set are ignored.
pub fn merge_signals(
    previous: &SignalBoard,
    batch: &SignalBatch,
    acquired_at: DateTime<Utc>,
) -> SignalBoard {
    let mut merged = previous.clone();

    for report in &batch.reports {
        let symbol: AssetSymbol = match report.symbol.parse() {
            Ok(symbol) => symbol,
            Err(_) => {
                debug!("Ignoring report for untracked symbol {}", report.symbol);
                continue;
            }
        };

        merged.set(Signal {
            symbol,
            name: symbol.display_name().to_string(),
            signal: report.signal,
            last_price: report.last_price.clone(),
            technical_summary: report.technical_summary.clone(),
            fundamental_summary: report.fundamental_summary.clone(),
            justification: report.justification.clone(),
            sources: batch.sources.clone(),
            acquired_at,
        });
    }

    merged
}
