//! Aligned log-price panel.
//!
//! A [`Panel`] holds one trailing year of log adjusted-close prices for
//! every stock that survived the exclusion rules, together with the
//! [`Hierarchy`] built from the survivors' labels. Both are immutable
//! after construction.
//!
//! Exclusion is per symbol and never fatal: a symbol with too little
//! history, a missing sector/industry label, or a non-positive price in
//! its window is dropped with a recorded [`DataError`] and a warning.
//! The run aborts only if nothing survives.

use crate::error::{DataError, Result};
use crate::hierarchy::Hierarchy;
use chrono::NaiveDate;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Panel construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Maximum window length in trading days (one trailing year)
    pub window: usize,

    /// Minimum history a symbol must have to be included
    pub min_history: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            window: 252,
            min_history: 60,
        }
    }
}

/// One symbol's raw input: adjusted close history plus classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRecord {
    /// Ticker symbol
    pub symbol: String,

    /// Sector label
    pub sector: String,

    /// Industry label
    pub industry: String,

    /// Adjusted close prices, oldest first, aligned to the common
    /// trading-day calendar by the acquisition layer
    pub close: Vec<f64>,
}

/// A symbol excluded during panel construction, with its reason.
#[derive(Debug, Clone)]
pub struct Exclusion {
    /// Excluded symbol
    pub symbol: String,

    /// Why it was excluded
    pub reason: DataError,
}

/// Aligned time series of log-prices plus the membership hierarchy.
#[derive(Debug, Clone)]
pub struct Panel {
    hierarchy: Hierarchy,
    /// N x T log adjusted-close prices
    log_prices: Array2<f64>,
    /// Trading-day labels, length T
    dates: Vec<NaiveDate>,
    excluded: Vec<Exclusion>,
}

impl Panel {
    /// Build a panel from per-symbol records and the trailing
    /// trading-day calendar.
    ///
    /// `dates` must cover at least the resulting window; both the date
    /// labels and each record's history are truncated to the common
    /// trailing window, which is the shorter of `config.window` and the
    /// shortest included history.
    pub fn new(records: Vec<StockRecord>, dates: &[NaiveDate], config: &PanelConfig) -> Result<Self> {
        let mut included: Vec<StockRecord> = Vec::with_capacity(records.len());
        let mut excluded: Vec<Exclusion> = Vec::new();

        for record in records {
            match Self::screen(&record, config) {
                Ok(()) => included.push(record),
                Err(reason) => {
                    warn!(symbol = %record.symbol, %reason, "excluding symbol from panel");
                    excluded.push(Exclusion {
                        symbol: record.symbol,
                        reason,
                    });
                }
            }
        }

        if included.is_empty() {
            return Err(DataError::EmptyPanel {
                excluded: excluded.len(),
            });
        }

        let shortest = included.iter().map(|r| r.close.len()).min().unwrap_or(0);
        let window = config.window.min(shortest);
        if dates.len() < window {
            return Err(DataError::MisalignedDates {
                supplied: dates.len(),
                required: window,
            });
        }

        let num_stocks = included.len();
        let mut log_prices = Array2::zeros((num_stocks, window));
        for (row, record) in included.iter().enumerate() {
            let tail = &record.close[record.close.len() - window..];
            for (t, &price) in tail.iter().enumerate() {
                log_prices[[row, t]] = price.ln();
            }
        }

        let labels: Vec<(&str, &str, &str)> = included
            .iter()
            .map(|r| (r.symbol.as_str(), r.sector.as_str(), r.industry.as_str()))
            .collect();

        Ok(Self {
            hierarchy: Hierarchy::from_labels(&labels),
            log_prices,
            dates: dates[dates.len() - window..].to_vec(),
            excluded,
        })
    }

    /// Apply the per-symbol exclusion rules.
    fn screen(record: &StockRecord, config: &PanelConfig) -> Result<()> {
        if record.sector.trim().is_empty() {
            return Err(DataError::MissingClassification {
                symbol: record.symbol.clone(),
                what: "sector",
            });
        }
        if record.industry.trim().is_empty() {
            return Err(DataError::MissingClassification {
                symbol: record.symbol.clone(),
                what: "industry",
            });
        }
        if record.close.len() < config.min_history {
            return Err(DataError::InsufficientHistory {
                symbol: record.symbol.clone(),
                required: config.min_history,
                actual: record.close.len(),
            });
        }
        let tail_start = record.close.len().saturating_sub(config.window);
        for (offset, &price) in record.close[tail_start..].iter().enumerate() {
            if price <= 0.0 || !price.is_finite() {
                return Err(DataError::NonPositivePrice {
                    symbol: record.symbol.clone(),
                    value: price,
                    day: offset + 1,
                });
            }
        }
        Ok(())
    }

    /// Membership hierarchy of the included symbols.
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Log-price matrix, stocks x trading days.
    pub fn log_prices(&self) -> ArrayView2<'_, f64> {
        self.log_prices.view()
    }

    /// Log-price series of one stock.
    pub fn stock_series(&self, stock: usize) -> ArrayView1<'_, f64> {
        self.log_prices.row(stock)
    }

    /// Number of included stocks.
    pub fn num_stocks(&self) -> usize {
        self.log_prices.nrows()
    }

    /// Window length T in trading days.
    pub fn len(&self) -> usize {
        self.log_prices.ncols()
    }

    /// Whether the panel window is empty.
    pub fn is_empty(&self) -> bool {
        self.log_prices.ncols() == 0
    }

    /// Normalized time grid `tau_t = t / T` for `t = 1..T`.
    pub fn normalized_time(&self) -> Array1<f64> {
        let t = self.len() as f64;
        Array1::from_iter((1..=self.len()).map(|day| day as f64 / t))
    }

    /// Trading-day labels, length T.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Last trading day of the window.
    pub fn last_date(&self) -> NaiveDate {
        *self.dates.last().expect("panel window is never empty")
    }

    /// Last observed log-price of one stock.
    pub fn last_log_price(&self, stock: usize) -> f64 {
        self.log_prices[[stock, self.len() - 1]]
    }

    /// Last observed price of one stock.
    pub fn last_price(&self, stock: usize) -> f64 {
        self.last_log_price(stock).exp()
    }

    /// Symbols excluded during construction, with reasons.
    pub fn excluded(&self) -> &[Exclusion] {
        &self.excluded
    }

    /// A copy of the panel restricted to the first `len` trading days,
    /// used for holdout fitting. The hierarchy is unchanged.
    ///
    /// # Panics
    /// Panics if `len` exceeds the panel window.
    pub fn truncated(&self, len: usize) -> Self {
        assert!(len <= self.len(), "cannot extend a panel");
        Self {
            hierarchy: self.hierarchy.clone(),
            log_prices: self.log_prices.slice(s![.., ..len]).to_owned(),
            dates: self.dates[..len].to_vec(),
            excluded: self.excluded.clone(),
        }
    }
}
