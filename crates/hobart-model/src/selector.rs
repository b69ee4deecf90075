//! Polynomial-order selection by holdout calibration.
//!
//! Each candidate degree is fitted with the last five trading days held
//! out, then judged by how close the second moment of its standardized
//! holdout residuals is to one. A well-scaled Gaussian likelihood has
//! unit second moment, so this is a calibration criterion rather than a
//! fit-quality criterion: an overfitted degree produces overconfident
//! sigmas and a second moment far above one.

use crate::fitter::{FittedParameters, SequentialFitter};
use crate::prior::HierarchicalModel;
use crate::trainer::TrainerConfig;
use hobart_data::Panel;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Number of trailing trading days held out for calibration.
pub const HOLDOUT_DAYS: usize = 5;

/// Sigma floor below which a stock is dropped from the calibration
/// moment, guarding degenerate zero-variance fits.
const SIGMA_FLOOR: f64 = 1e-12;

/// Fatal configuration problems, checked before any fitting begins.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// No candidate degrees were supplied
    #[error("candidate degree set is empty")]
    EmptyDegreeSet,

    /// A candidate degree of zero cannot express a trend
    #[error("invalid candidate degree {0}, degrees must be at least 1")]
    InvalidDegree(usize),

    /// The panel contains no stocks
    #[error("symbol universe is empty")]
    EmptyUniverse,

    /// The panel window cannot accommodate the holdout
    #[error("panel window of {window} trading days is too short, need more than {required}")]
    WindowTooShort {
        /// Panel window length
        window: usize,
        /// Minimum number of trading days required
        required: usize,
    },
}

/// Order-selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Candidate polynomial degrees
    pub degrees: Vec<usize>,

    /// Optimizer settings shared by every candidate fit
    pub trainer: TrainerConfig,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            degrees: (1..=8).collect(),
            trainer: TrainerConfig::default(),
        }
    }
}

/// Calibration diagnostics for one candidate degree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateDiagnostic {
    /// Candidate polynomial degree
    pub degree: usize,

    /// Empirical second moment of the standardized holdout residuals
    pub second_moment: f64,

    /// Calibration score `|second_moment - 1|`; lower is better
    pub calibration: f64,
}

/// Winning degree, final full-window parameters, and the per-candidate
/// diagnostics.
#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    /// Selected polynomial degree
    pub degree: usize,

    /// Parameters from the full-window refit at the selected degree
    pub parameters: FittedParameters,

    /// One diagnostic per candidate, in candidate order
    pub diagnostics: Vec<CandidateDiagnostic>,
}

/// Drives [`SequentialFitter`] over the candidate degrees and picks the
/// best-calibrated one.
#[derive(Debug, Clone, Default)]
pub struct OrderSelector {
    config: SelectorConfig,
}

impl OrderSelector {
    /// Selector with the given configuration.
    pub const fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    /// Validate the configuration against a panel.
    ///
    /// Configuration problems are the only fatal errors of the engine;
    /// they abort before any fitting begins.
    pub fn validate(&self, panel: &Panel) -> Result<(), ConfigError> {
        if self.config.degrees.is_empty() {
            return Err(ConfigError::EmptyDegreeSet);
        }
        if let Some(&bad) = self.config.degrees.iter().find(|&&d| d == 0) {
            return Err(ConfigError::InvalidDegree(bad));
        }
        if panel.num_stocks() == 0 {
            return Err(ConfigError::EmptyUniverse);
        }
        if panel.len() <= HOLDOUT_DAYS {
            return Err(ConfigError::WindowTooShort {
                window: panel.len(),
                required: HOLDOUT_DAYS,
            });
        }
        Ok(())
    }

    /// Evaluate every candidate on the holdout, pick the winner, and
    /// refit it on the full window.
    pub fn select(&self, panel: &Panel) -> Result<SelectionOutcome, ConfigError> {
        self.validate(panel)?;

        let fit_window = panel.len() - HOLDOUT_DAYS;
        let fit_panel = panel.truncated(fit_window);

        // Candidates are mutually independent; the winner pick below is
        // the only synchronization point.
        let diagnostics: Vec<CandidateDiagnostic> = self
            .config
            .degrees
            .par_iter()
            .map(|&degree| {
                let fitter = SequentialFitter::new(
                    HierarchicalModel::new(degree),
                    self.config.trainer.clone(),
                );
                let fitted = fitter.fit(&fit_panel);
                let second_moment = holdout_second_moment(panel, &fit_panel, &fitted);
                CandidateDiagnostic {
                    degree,
                    second_moment,
                    calibration: (second_moment - 1.0).abs(),
                }
            })
            .collect();

        // Ties go to the earliest (smallest) candidate degree.
        let winner = diagnostics
            .iter()
            .min_by(|a, b| {
                a.calibration
                    .partial_cmp(&b.calibration)
                    .unwrap_or(std::cmp::Ordering::Greater)
            })
            .expect("candidate set is non-empty");
        info!(
            degree = winner.degree,
            second_moment = winner.second_moment,
            "selected polynomial degree"
        );

        let fitter = SequentialFitter::new(
            HierarchicalModel::new(winner.degree),
            self.config.trainer.clone(),
        );
        Ok(SelectionOutcome {
            degree: winner.degree,
            parameters: fitter.fit(panel),
            diagnostics,
        })
    }
}

/// Second moment of the standardized residuals over the held-out days.
///
/// Held-out times are extrapolations of the holdout fit: with the fit
/// window `T'` as normalizer, day `T - r` sits at `tau = (T - r) / T'`,
/// beyond the end of the fitted grid.
fn holdout_second_moment(panel: &Panel, fit_panel: &Panel, fitted: &FittedParameters) -> f64 {
    let fit_window = fit_panel.len() as f64;
    let mut total = 0.0;
    let mut count = 0usize;

    for stock in 0..panel.num_stocks() {
        let fit = fitted.stock(stock);
        let sigma = fit.sigma();
        if sigma < SIGMA_FLOOR || !sigma.is_finite() {
            warn!(
                symbol = panel.hierarchy().symbol(stock),
                sigma, "degenerate scale, dropping stock from calibration"
            );
            continue;
        }
        for day in fit_panel.len() + 1..=panel.len() {
            let tau = day as f64 / fit_window;
            let predicted = fit.log_price_at(tau);
            let observed = panel.log_prices()[[stock, day - 1]];
            let standardized = (predicted - observed) / sigma;
            total += standardized * standardized;
            count += 1;
        }
    }

    if count == 0 {
        // Every stock was degenerate; make this candidate lose.
        return f64::INFINITY;
    }
    total / count as f64
}
