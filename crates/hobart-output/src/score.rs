//! Opportunity scores and trend ratings.
//!
//! The score of a stock is its five-day-ahead trend extrapolation minus
//! its last observed log-price, in units of the stock's fitted standard
//! deviation. A large positive score means the last price sits well
//! below the estimated trend; the discrete rating buckets the score
//! with fixed thresholds.

use crate::stats::{EstimationCurve, LogNormalStats, estimation_curve};
use chrono::NaiveDate;
use hobart_data::Panel;
use hobart_model::{FittedParameters, Level};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Prediction horizon in trading days.
pub const FORWARD_DAYS: usize = 5;

/// Sigma floor below which a stock's output is marked unavailable.
const SIGMA_FLOOR: f64 = 1e-12;

/// Errors that can occur while exporting scored output.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Discrete trend rating derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    /// Score above 3: price far below the estimated trend
    HighlyBelowTrend,

    /// Score in (2, 3]
    BelowTrend,

    /// Score in [-2, 2]: price consistent with the trend
    AlongTrend,

    /// Score in [-3, -2)
    AboveTrend,

    /// Score below -3: price far above the estimated trend
    HighlyAboveTrend,
}

impl Rating {
    /// Bucket a score with the fixed thresholds.
    ///
    /// Boundaries are closed toward the milder rating: a score of
    /// exactly 2 is still along-trend, exactly 3 still below-trend,
    /// and mirrored on the negative side.
    pub fn from_score(score: f64) -> Self {
        if score > 3.0 {
            Self::HighlyBelowTrend
        } else if score > 2.0 {
            Self::BelowTrend
        } else if score >= -2.0 {
            Self::AlongTrend
        } else if score >= -3.0 {
            Self::AboveTrend
        } else {
            Self::HighlyAboveTrend
        }
    }

    /// All ratings, from most below-trend to most above-trend.
    pub const fn all() -> [Self; 5] {
        [
            Self::HighlyBelowTrend,
            Self::BelowTrend,
            Self::AlongTrend,
            Self::AboveTrend,
            Self::HighlyAboveTrend,
        ]
    }

    /// Display label used in the prediction table.
    pub const fn label(self) -> &'static str {
        match self {
            Self::HighlyBelowTrend => "HIGHLY BELOW TREND",
            Self::BelowTrend => "BELOW TREND",
            Self::AlongTrend => "ALONG TREND",
            Self::AboveTrend => "ABOVE TREND",
            Self::HighlyAboveTrend => "HIGHLY ABOVE TREND",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Score and forward estimate of one stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockScore {
    /// Panel row of the stock
    pub stock: usize,

    /// Ticker symbol
    pub symbol: String,

    /// Standardized five-day-ahead score
    pub score: f64,

    /// Rating bucket of the score
    pub rating: Rating,

    /// Extrapolated log-price five trading days ahead
    pub predicted_log_price: f64,

    /// Fitted standard deviation of the stock's log-price
    pub sigma: f64,
}

/// One row of the ranked prediction table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRow {
    /// Ticker symbol
    pub symbol: String,

    /// Sector label
    pub sector: String,

    /// Industry label
    pub industry: String,

    /// Last trading day of the panel window
    pub date: NaiveDate,

    /// Last observed adjusted close
    pub last_price: f64,

    /// Log-normal mean of the predicted price
    pub predicted_price: f64,

    /// Log-normal standard deviation of the predicted price
    pub predicted_stdev: f64,

    /// Standardized score
    pub score: f64,

    /// Rating bucket
    pub rating: Rating,
}

/// Converts final fitted parameters into scores, ratings, curves, and
/// the ranked prediction table. Purely derived, read-only outputs.
#[derive(Debug, Clone, Copy)]
pub struct ScoringEngine<'a> {
    panel: &'a Panel,
    parameters: &'a FittedParameters,
}

impl<'a> ScoringEngine<'a> {
    /// Engine over one panel and the parameters fitted from it.
    pub const fn new(panel: &'a Panel, parameters: &'a FittedParameters) -> Self {
        Self { panel, parameters }
    }

    /// Normalized time of the prediction horizon, `(T + 5) / T`.
    pub fn forward_tau(&self) -> f64 {
        let window = self.panel.len() as f64;
        (window + FORWARD_DAYS as f64) / window
    }

    /// Score every stock whose fit is numerically usable.
    ///
    /// Stocks with a degenerate scale or a non-finite score are skipped
    /// with a warning; they never abort the run.
    pub fn scores(&self) -> Vec<StockScore> {
        let tau = self.forward_tau();
        let mut scores = Vec::with_capacity(self.panel.num_stocks());

        for stock in 0..self.panel.num_stocks() {
            let symbol = self.panel.hierarchy().symbol(stock);
            let fit = self.parameters.stock(stock);
            let sigma = fit.sigma();
            if sigma < SIGMA_FLOOR || !sigma.is_finite() {
                warn!(symbol, sigma, "degenerate scale, output unavailable");
                continue;
            }

            let predicted_log_price = fit.log_price_at(tau);
            let score = (predicted_log_price - self.panel.last_log_price(stock)) / sigma;
            if !score.is_finite() {
                warn!(symbol, score, "non-finite score, output unavailable");
                continue;
            }

            scores.push(StockScore {
                stock,
                symbol: symbol.to_string(),
                score,
                rating: Rating::from_score(score),
                predicted_log_price,
                sigma,
            });
        }
        scores
    }

    /// Ranked prediction table, most below-trend first.
    pub fn prediction_table(&self) -> Vec<PredictionRow> {
        let hierarchy = self.panel.hierarchy();
        let date = self.panel.last_date();
        let mut rows: Vec<PredictionRow> = self
            .scores()
            .into_iter()
            .map(|score| {
                let prediction =
                    LogNormalStats::from_log(score.predicted_log_price, score.sigma);
                PredictionRow {
                    sector: hierarchy
                        .sector_name(hierarchy.sector_of_stock(score.stock))
                        .to_string(),
                    industry: hierarchy
                        .industry_name(hierarchy.industry_of_stock(score.stock))
                        .to_string(),
                    symbol: score.symbol,
                    date,
                    last_price: self.panel.last_price(score.stock),
                    predicted_price: prediction.mean,
                    predicted_stdev: prediction.stdev,
                    score: score.score,
                    rating: score.rating,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows
    }

    /// Prediction table as a JSON document, for downstream exporters.
    pub fn table_json(&self) -> Result<String, ScoreError> {
        Ok(serde_json::to_string_pretty(&self.prediction_table())?)
    }

    /// Historical estimation curve of one node, with a
    /// `band_width`-standard-deviation band.
    pub fn curve(&self, level: Level, index: usize, band_width: f64) -> EstimationCurve {
        let tau = self.panel.normalized_time();
        estimation_curve(self.parameters.node(level, index), tau.view(), band_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use hobart_data::{PanelConfig, StockRecord};
    use hobart_model::NodeFit;
    use ndarray::array;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, Rating::AlongTrend)]
    #[case(2.0, Rating::AlongTrend)]
    #[case(2.0001, Rating::BelowTrend)]
    #[case(3.0, Rating::BelowTrend)]
    #[case(3.0001, Rating::HighlyBelowTrend)]
    #[case(-2.0, Rating::AlongTrend)]
    #[case(-2.0001, Rating::AboveTrend)]
    #[case(-3.0, Rating::AboveTrend)]
    #[case(-3.0001, Rating::HighlyAboveTrend)]
    fn test_rating_boundaries(#[case] score: f64, #[case] expected: Rating) {
        assert_eq!(Rating::from_score(score), expected);
    }

    #[test]
    fn test_rating_labels() {
        assert_eq!(Rating::AlongTrend.to_string(), "ALONG TREND");
        assert_eq!(Rating::all().len(), 5);
    }

    fn two_stock_fixture() -> (Panel, FittedParameters) {
        let len = 20;
        let dates: Vec<NaiveDate> = {
            let start = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
            (0..len).map(|i| start + chrono::Days::new(i as u64)).collect()
        };
        let config = PanelConfig {
            window: len,
            min_history: len,
        };
        let series = |intercept: f64, slope: f64| -> Vec<f64> {
            (1..=len)
                .map(|t| (intercept + slope * t as f64 / len as f64).exp())
                .collect()
        };
        let records = vec![
            StockRecord {
                symbol: "UP".to_string(),
                sector: "Tech".to_string(),
                industry: "Software".to_string(),
                close: series(4.0, 0.5),
            },
            StockRecord {
                symbol: "DN".to_string(),
                sector: "Tech".to_string(),
                industry: "Hardware".to_string(),
                close: series(4.0, -0.5),
            },
        ];
        let panel = Panel::new(records, &dates, &config).unwrap();

        // Hand-built parameters: exact linear fits with sigma = softplus(psi).
        let node = |intercept: f64, slope: f64, psi: f64| NodeFit {
            phi: array![intercept, slope],
            psi,
            objective: 0.0,
            converged: true,
        };
        let parameters = FittedParameters {
            degree: 1,
            market: node(4.0, 0.0, 0.0),
            sectors: vec![node(4.0, 0.0, 0.0)],
            industries: vec![node(4.0, 0.5, 0.0), node(4.0, -0.5, 0.0)],
            stocks: vec![node(4.0, 0.5, -3.0), node(4.0, -0.5, -3.0)],
        };
        (panel, parameters)
    }

    #[test]
    fn test_scores_follow_the_trend_sign() {
        let (panel, parameters) = two_stock_fixture();
        let engine = ScoringEngine::new(&panel, &parameters);

        let scores = engine.scores();
        assert_eq!(scores.len(), 2);

        // The exact fit extrapolates the trend: 0.5 * 5/20 = 0.125 in
        // log-price, standardized by softplus(-3).
        let sigma = parameters.stocks[0].sigma();
        assert_relative_eq!(scores[0].score, 0.125 / sigma, epsilon = 1e-9);
        assert_relative_eq!(scores[1].score, -0.125 / sigma, epsilon = 1e-9);
        assert!(scores[0].score > 0.0);
        assert!(scores[1].score < 0.0);
    }

    #[test]
    fn test_table_ranked_most_below_trend_first() {
        let (panel, parameters) = two_stock_fixture();
        let engine = ScoringEngine::new(&panel, &parameters);

        let table = engine.prediction_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].symbol, "UP");
        assert!(table[0].score > table[1].score);
        assert_eq!(table[0].sector, "Tech");
        assert_eq!(table[0].industry, "Software");
        assert_relative_eq!(table[0].last_price, 4.5_f64.exp(), epsilon = 1e-9);
        assert!(table[0].predicted_stdev > 0.0);
    }

    #[test]
    fn test_degenerate_sigma_marks_output_unavailable() {
        let (panel, mut parameters) = two_stock_fixture();
        parameters.stocks[1].psi = -1000.0;
        let engine = ScoringEngine::new(&panel, &parameters);

        let scores = engine.scores();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].symbol, "UP");
    }

    #[test]
    fn test_table_json_round_trips() {
        let (panel, parameters) = two_stock_fixture();
        let engine = ScoringEngine::new(&panel, &parameters);

        let json = engine.table_json().unwrap();
        let parsed: Vec<PredictionRow> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].rating, engine.prediction_table()[0].rating);
    }

    #[test]
    fn test_curve_covers_the_window() {
        let (panel, parameters) = two_stock_fixture();
        let engine = ScoringEngine::new(&panel, &parameters);

        let curve = engine.curve(Level::Market, 0, 2.0);
        assert_eq!(curve.mean.len(), panel.len());
    }
}
