//! Prior structure of the hierarchical model.
//!
//! For a chosen polynomial degree D the model places, at every node,
//! a coefficient vector `phi` of length D+1 and a scalar scale
//! parameter `psi` (`sigma = softplus(psi)`). A child's parameters are
//! anchored to its parent's with a level-dependent variance multiplier,
//! and higher-order coefficients carry smaller prior scales so that
//! curvature is shrunk harder than level.

use crate::math;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One level of the market → sector → industry → stock hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Whole-market root node
    Market,

    /// Sector nodes
    Sector,

    /// Industry nodes
    Industry,

    /// Stock leaf nodes
    Stock,
}

impl Level {
    /// All levels, in top-down fitting order.
    pub const fn all() -> [Self; 4] {
        [Self::Market, Self::Sector, Self::Industry, Self::Stock]
    }

    /// Parent level, `None` at the market root.
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Market => None,
            Self::Sector => Some(Self::Market),
            Self::Industry => Some(Self::Sector),
            Self::Stock => Some(Self::Industry),
        }
    }

    /// Prior variance multiplier applied to the coefficient scales.
    pub const fn phi_multiplier(self) -> f64 {
        match self {
            Self::Market => 16.0,
            Self::Sector => 4.0,
            Self::Industry => 1.0,
            Self::Stock => 0.25,
        }
    }

    /// Prior variance of the scale parameter around its parent.
    pub const fn psi_multiplier(self) -> f64 {
        // Same schedule as the coefficients, unscaled.
        self.phi_multiplier()
    }

    /// Level name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Sector => "sector",
            Self::Industry => "industry",
            Self::Stock => "stock",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Prior and likelihood structure for one polynomial degree.
///
/// Pure function of the degree; holds no fitted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchicalModel {
    degree: usize,
}

impl HierarchicalModel {
    /// Model for polynomial degree `degree`.
    pub const fn new(degree: usize) -> Self {
        Self { degree }
    }

    /// Polynomial degree D.
    pub const fn degree(&self) -> usize {
        self.degree
    }

    /// Number of coefficients, D+1.
    pub const fn num_coefficients(&self) -> usize {
        self.degree + 1
    }

    /// Prior scale schedule `sigma_j = (D+1-j)/(D+1)` for `j = 0..D`.
    ///
    /// Decreasing in the coefficient order, so higher-order terms are
    /// shrunk harder toward their parent.
    pub fn coefficient_scales(&self) -> Array1<f64> {
        let d1 = (self.degree + 1) as f64;
        Array1::from_iter((0..=self.degree).map(|j| (d1 - j as f64) / d1))
    }

    /// Polynomial design matrix over a normalized time grid.
    pub fn design_matrix(&self, tau: ArrayView1<'_, f64>) -> Array2<f64> {
        math::design_matrix(tau, self.degree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_level_order_and_parents() {
        let levels = Level::all();
        assert_eq!(levels[0], Level::Market);
        assert_eq!(levels[3], Level::Stock);
        assert_eq!(Level::Market.parent(), None);
        assert_eq!(Level::Stock.parent(), Some(Level::Industry));
    }

    #[test]
    fn test_multipliers_decrease_down_the_tree() {
        let mut previous = f64::INFINITY;
        for level in Level::all() {
            assert!(level.phi_multiplier() < previous);
            assert_eq!(level.phi_multiplier(), level.psi_multiplier());
            previous = level.phi_multiplier();
        }
        assert_relative_eq!(Level::Market.phi_multiplier(), 16.0);
        assert_relative_eq!(Level::Stock.phi_multiplier(), 0.25);
    }

    #[test]
    fn test_coefficient_scales_schedule() {
        let model = HierarchicalModel::new(3);
        let scales = model.coefficient_scales();
        assert_eq!(scales.len(), 4);
        assert_relative_eq!(scales[0], 1.0);
        assert_relative_eq!(scales[1], 0.75);
        assert_relative_eq!(scales[3], 0.25);
    }

    #[test]
    fn test_design_matrix_shape() {
        let model = HierarchicalModel::new(2);
        let tau = array![0.5, 0.75, 1.0];
        assert_eq!(model.design_matrix(tau.view()).dim(), (3, 3));
    }
}
