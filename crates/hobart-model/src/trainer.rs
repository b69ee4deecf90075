//! Per-level MAP regression.
//!
//! A level is fitted one node at a time: each node minimizes a
//! Gaussian negative log-likelihood of its target series around a
//! degree-D polynomial in normalized time, plus quadratic anchor
//! penalties pulling its coefficients and scale parameter toward the
//! frozen fit of its parent node. The market root is anchored to a
//! zero-mean prior.
//!
//! Minimization is plain Adam from a zero initialization, so a fit is
//! deterministic for fixed data. Nodes within a level are independent
//! given their anchors and are fitted by a parallel map.

use crate::math::{polyval, sigmoid, softplus};
use crate::prior::{HierarchicalModel, Level};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Scale floor applied inside the objective, guarding zero-variance
/// targets from degenerate likelihood weights.
const SIGMA_FLOOR: f64 = 1e-12;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

/// Optimizer settings for one node fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Adam learning rate
    pub learning_rate: f64,

    /// Iteration cap; hitting it is a warning, not an error
    pub max_iterations: usize,

    /// Relative-improvement stopping threshold on the objective
    pub relative_tolerance: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            max_iterations: 5_000,
            relative_tolerance: 1e-9,
        }
    }
}

/// Frozen parent parameters a node is regularized toward.
#[derive(Debug, Clone)]
pub struct Anchor {
    /// Parent coefficient vector
    pub phi: Array1<f64>,

    /// Parent scale parameter
    pub psi: f64,
}

impl Anchor {
    /// Zero-mean anchor used at the market root.
    pub fn root(num_coefficients: usize) -> Self {
        Self {
            phi: Array1::zeros(num_coefficients),
            psi: 0.0,
        }
    }
}

/// Fitted parameters of one hierarchy node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFit {
    /// Polynomial coefficients in normalized time, ascending order
    pub phi: Array1<f64>,

    /// Scale parameter; `softplus(psi)` is the fitted standard deviation
    pub psi: f64,

    /// Final objective value, for diagnostics only
    pub objective: f64,

    /// Whether the relative-improvement threshold was met before the
    /// iteration cap
    pub converged: bool,
}

impl NodeFit {
    /// Fitted standard deviation of the node's log-price series.
    pub fn sigma(&self) -> f64 {
        softplus(self.psi)
    }

    /// Fitted (or extrapolated) log-price at normalized time `tau`.
    pub fn log_price_at(&self, tau: f64) -> f64 {
        polyval(self.phi.view(), tau)
    }

    /// Fitted curve over a normalized time grid.
    pub fn curve(&self, tau: ArrayView1<'_, f64>) -> Array1<f64> {
        tau.mapv(|t| self.log_price_at(t))
    }

    /// This node's parameters as the anchor for its children.
    pub fn as_anchor(&self) -> Anchor {
        Anchor {
            phi: self.phi.clone(),
            psi: self.psi,
        }
    }
}

/// Fits every node of one hierarchy level against its target series
/// and frozen parent anchor.
#[derive(Debug, Clone, Copy)]
pub struct LevelTrainer<'a> {
    model: &'a HierarchicalModel,
    config: &'a TrainerConfig,
}

impl<'a> LevelTrainer<'a> {
    /// Trainer for one model (degree) and optimizer configuration.
    pub const fn new(model: &'a HierarchicalModel, config: &'a TrainerConfig) -> Self {
        Self { model, config }
    }

    /// Fit all nodes of `level`.
    ///
    /// `targets` is one regression target series per node (nodes x T),
    /// `design` the polynomial design matrix over the level's
    /// normalized time grid (T x D+1), and `anchors` the frozen parent
    /// parameters, one per node.
    ///
    /// # Panics
    /// Panics if the number of targets and anchors disagree.
    pub fn fit_level(
        &self,
        level: Level,
        targets: ArrayView2<'_, f64>,
        design: ArrayView2<'_, f64>,
        anchors: &[Anchor],
    ) -> Vec<NodeFit> {
        assert_eq!(
            targets.nrows(),
            anchors.len(),
            "one anchor per target series"
        );

        let fits: Vec<NodeFit> = (0..targets.nrows())
            .into_par_iter()
            .map(|node| self.fit_node(level, targets.row(node), design, &anchors[node]))
            .collect();

        let stalled = fits.iter().filter(|fit| !fit.converged).count();
        if stalled > 0 {
            warn!(
                level = %level,
                stalled,
                nodes = fits.len(),
                cap = self.config.max_iterations,
                "optimizer hit the iteration cap, returning best-so-far estimates"
            );
        }
        fits
    }

    /// Fit a single node by Adam descent on the MAP objective.
    pub fn fit_node(
        &self,
        level: Level,
        target: ArrayView1<'_, f64>,
        design: ArrayView2<'_, f64>,
        anchor: &Anchor,
    ) -> NodeFit {
        let num_coefficients = self.model.num_coefficients();
        debug_assert_eq!(design.ncols(), num_coefficients);
        debug_assert_eq!(anchor.phi.len(), num_coefficients);

        // Prior variances: level multiplier times the squared
        // order-dependent coefficient scales.
        let phi_variances = self
            .model
            .coefficient_scales()
            .mapv(|scale| level.phi_multiplier() * scale * scale);
        let psi_variance = level.psi_multiplier();

        let objective = |phi: &ArrayView1<'_, f64>, psi: f64| -> f64 {
            let sigma = softplus(psi).max(SIGMA_FLOOR);
            let residual = &target - &design.dot(phi);
            let sse = residual.dot(&residual);
            let likelihood = sse / (2.0 * sigma * sigma) + target.len() as f64 * sigma.ln();
            let phi_penalty = phi
                .iter()
                .zip(anchor.phi.iter())
                .zip(phi_variances.iter())
                .map(|((&p, &a), &var)| (p - a) * (p - a) / (2.0 * var))
                .sum::<f64>();
            let psi_penalty = (psi - anchor.psi) * (psi - anchor.psi) / (2.0 * psi_variance);
            likelihood + phi_penalty + psi_penalty
        };

        // Parameter vector is [phi_0 .. phi_D, psi].
        let mut params = Array1::<f64>::zeros(num_coefficients + 1);
        let mut gradient = Array1::<f64>::zeros(num_coefficients + 1);
        let mut adam = Adam::new(self.config.learning_rate, num_coefficients + 1);

        let (phi0, psi0) = split(&params);
        let mut previous = objective(&phi0, psi0);
        let mut best_objective = previous;
        let mut best_params = params.clone();
        let mut converged = false;

        for _ in 0..self.config.max_iterations {
            {
                let (phi, psi) = split(&params);
                let sigma = softplus(psi).max(SIGMA_FLOOR);
                let residual = &target - &design.dot(&phi);
                let sse = residual.dot(&residual);

                let grad_phi = design.t().dot(&residual) * (-1.0 / (sigma * sigma));
                for j in 0..num_coefficients {
                    gradient[j] = grad_phi[j] + (phi[j] - anchor.phi[j]) / phi_variances[j];
                }
                let grad_sigma =
                    -sse / (sigma * sigma * sigma) + target.len() as f64 / sigma;
                gradient[num_coefficients] =
                    grad_sigma * sigmoid(psi) + (psi - anchor.psi) / psi_variance;
            }

            adam.step(&mut params, &gradient);

            let (phi, psi) = split(&params);
            let current = objective(&phi, psi);
            if current < best_objective {
                best_objective = current;
                best_params.assign(&params);
            }
            if (previous - current).abs() / previous.abs().max(1.0)
                < self.config.relative_tolerance
            {
                converged = true;
                break;
            }
            previous = current;
        }

        let phi = best_params.slice(ndarray::s![..num_coefficients]).to_owned();
        NodeFit {
            phi,
            psi: best_params[num_coefficients],
            objective: best_objective,
            converged,
        }
    }
}

/// Split a parameter vector into its coefficient view and scale scalar.
fn split(params: &Array1<f64>) -> (ArrayView1<'_, f64>, f64) {
    let n = params.len() - 1;
    (params.slice(ndarray::s![..n]), params[n])
}

/// Adam state for one node fit.
#[derive(Debug)]
struct Adam {
    learning_rate: f64,
    step_count: usize,
    first_moment: Array1<f64>,
    second_moment: Array1<f64>,
}

impl Adam {
    fn new(learning_rate: f64, dimension: usize) -> Self {
        Self {
            learning_rate,
            step_count: 0,
            first_moment: Array1::zeros(dimension),
            second_moment: Array1::zeros(dimension),
        }
    }

    fn step(&mut self, params: &mut Array1<f64>, gradient: &Array1<f64>) {
        self.step_count += 1;
        let t = self.step_count as i32;
        let bias1 = 1.0 - ADAM_BETA1.powi(t);
        let bias2 = 1.0 - ADAM_BETA2.powi(t);

        for i in 0..params.len() {
            let g = gradient[i];
            self.first_moment[i] = ADAM_BETA1 * self.first_moment[i] + (1.0 - ADAM_BETA1) * g;
            self.second_moment[i] =
                ADAM_BETA2 * self.second_moment[i] + (1.0 - ADAM_BETA2) * g * g;
            let corrected_m = self.first_moment[i] / bias1;
            let corrected_v = self.second_moment[i] / bias2;
            params[i] -= self.learning_rate * corrected_m / (corrected_v.sqrt() + ADAM_EPSILON);
        }
    }
}
