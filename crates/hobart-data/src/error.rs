//! Error types for panel construction.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while building the price panel.
///
/// Per-symbol variants (`InsufficientHistory`, `MissingClassification`,
/// `NonPositivePrice`) never abort a run: the offending symbol is
/// excluded from the panel and the reason is recorded. Panel-level
/// variants (`EmptyPanel`, `MisalignedDates`) are fatal because no fit
/// can proceed without a panel.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    /// Symbol has fewer observations than the minimum window
    #[error("{symbol}: insufficient history, need at least {required} trading days, got {actual}")]
    InsufficientHistory {
        /// Symbol that was excluded
        symbol: String,
        /// Required number of trading days
        required: usize,
        /// Actual number of trading days supplied
        actual: usize,
    },

    /// Symbol is missing its sector or industry label
    #[error("{symbol}: missing {what} classification")]
    MissingClassification {
        /// Symbol that was excluded
        symbol: String,
        /// Which label is missing ("sector" or "industry")
        what: &'static str,
    },

    /// Symbol has a non-positive adjusted close, which cannot be log-transformed
    #[error("{symbol}: non-positive adjusted close {value} at trading day {day}")]
    NonPositivePrice {
        /// Symbol that was excluded
        symbol: String,
        /// Offending price value
        value: f64,
        /// Trading-day index of the offending value (1-based, within the window)
        day: usize,
    },

    /// No symbol survived the exclusion rules
    #[error("no symbol survived panel construction ({excluded} excluded)")]
    EmptyPanel {
        /// Number of symbols that were excluded
        excluded: usize,
    },

    /// Supplied trading-day labels do not cover the panel window
    #[error("trading-day labels cover {supplied} days but the panel window is {required}")]
    MisalignedDates {
        /// Number of dates supplied
        supplied: usize,
        /// Number of dates required by the window
        required: usize,
    },
}
