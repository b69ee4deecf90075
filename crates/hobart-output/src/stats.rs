//! Log-normal price statistics.
//!
//! Log-prices are modeled as Gaussian, so prices are log-normal. The
//! fitted `(y_hat, sigma_hat)` of any node at any time converts to the
//! mean and standard deviation of the implied price distribution, which
//! is what the plotting collaborator draws.

use hobart_model::NodeFit;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Mean and standard deviation of `exp(Gaussian)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogNormalStats {
    /// Mean of the price distribution
    pub mean: f64,

    /// Standard deviation of the price distribution
    pub stdev: f64,
}

impl LogNormalStats {
    /// Statistics of `exp(N(log_mean, log_stdev^2))`.
    pub fn from_log(log_mean: f64, log_stdev: f64) -> Self {
        let variance = log_stdev * log_stdev;
        let mean = (log_mean + variance / 2.0).exp();
        Self {
            mean,
            stdev: mean * (variance.exp_m1()).sqrt(),
        }
    }
}

/// A fitted price curve with a symmetric uncertainty band, one point
/// per trading day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimationCurve {
    /// Log-normal mean price per day
    pub mean: Vec<f64>,

    /// Lower band edge, floored at zero
    pub lower: Vec<f64>,

    /// Upper band edge
    pub upper: Vec<f64>,
}

/// Price curve of one node over a normalized time grid, with a
/// `band_width`-standard-deviation band.
pub fn estimation_curve(
    fit: &NodeFit,
    tau: ArrayView1<'_, f64>,
    band_width: f64,
) -> EstimationCurve {
    let sigma = fit.sigma();
    let mut mean = Vec::with_capacity(tau.len());
    let mut lower = Vec::with_capacity(tau.len());
    let mut upper = Vec::with_capacity(tau.len());

    for &tau_t in tau.iter() {
        let stats = LogNormalStats::from_log(fit.log_price_at(tau_t), sigma);
        mean.push(stats.mean);
        lower.push((stats.mean - band_width * stats.stdev).max(0.0));
        upper.push(stats.mean + band_width * stats.stdev);
    }

    EstimationCurve { mean, lower, upper }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_lognormal_moments() {
        // For y ~ N(0, 1): mean = e^{1/2}, var = (e - 1) e.
        let stats = LogNormalStats::from_log(0.0, 1.0);
        assert_relative_eq!(stats.mean, 0.5_f64.exp(), epsilon = 1e-12);
        assert_relative_eq!(
            stats.stdev,
            ((1.0_f64.exp() - 1.0) * 1.0_f64.exp()).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_vanishing_uncertainty_recovers_price() {
        let stats = LogNormalStats::from_log(4.0, 0.0);
        assert_relative_eq!(stats.mean, 4.0_f64.exp(), epsilon = 1e-12);
        assert_relative_eq!(stats.stdev, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_curve_band_is_ordered_and_floored() {
        let fit = NodeFit {
            phi: array![1.0, 0.5],
            psi: 2.0,
            objective: 0.0,
            converged: true,
        };
        let tau = array![0.25, 0.5, 0.75, 1.0];
        let curve = estimation_curve(&fit, tau.view(), 2.0);

        assert_eq!(curve.mean.len(), 4);
        for t in 0..4 {
            assert!(curve.lower[t] >= 0.0);
            assert!(curve.lower[t] <= curve.mean[t]);
            assert!(curve.mean[t] <= curve.upper[t]);
        }
    }
}
