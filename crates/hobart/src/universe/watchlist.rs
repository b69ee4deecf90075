//! Default flat watchlist.
//!
//! Used when no explicit symbol list is supplied. The list is a plain
//! editable set of liquid large caps; it carries no classification —
//! sector and industry labels come from the acquisition layer.

use crate::universe::Universe;
use serde::{Deserialize, Serialize};

/// Default symbols fitted when the caller supplies none.
pub const DEFAULT_SYMBOLS: &[&str] = &[
    "AAPL", "MSFT", "GOOG", "AMZN", "NVDA", "META", "TSLA", "AVGO", "ADBE", "CRM", "ORCL", "AMD",
    "INTC", "QCOM", "JPM", "BAC", "GS", "V", "MA", "JNJ", "PFE", "UNH", "XOM", "CVX", "WMT", "PG",
    "KO", "PEP", "DIS", "NFLX",
];

/// A flat, user-editable list of symbols.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watchlist {
    symbols: Vec<String>,
}

impl Watchlist {
    /// Watchlist over an explicit symbol list, deduplicated and kept
    /// in first-appearance order.
    pub fn new<S: Into<String>>(symbols: impl IntoIterator<Item = S>) -> Self {
        let mut deduped: Vec<String> = Vec::new();
        for symbol in symbols {
            let symbol = symbol.into();
            if !deduped.contains(&symbol) {
                deduped.push(symbol);
            }
        }
        Self { symbols: deduped }
    }
}

impl Default for Watchlist {
    fn default() -> Self {
        Self::new(DEFAULT_SYMBOLS.iter().copied())
    }
}

impl Universe for Watchlist {
    fn symbols(&self) -> Vec<String> {
        self.symbols.clone()
    }
}
