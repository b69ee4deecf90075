//! Small numeric helpers shared by the trainer and the selector.

use ndarray::{Array2, ArrayView1};

/// Numerically stable `softplus(x) = ln(1 + e^x)`.
///
/// Maps a real scale parameter to a strictly positive standard
/// deviation without ever returning zero or infinity for finite input.
pub fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// Logistic sigmoid, the derivative of [`softplus`].
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Evaluate a polynomial with ascending-order coefficients at `tau`.
pub fn polyval(coefficients: ArrayView1<'_, f64>, tau: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * tau + c)
}

/// Build the T x (D+1) polynomial design matrix over a normalized time
/// grid: row `t` is `(1, tau_t, tau_t^2, .., tau_t^D)`.
pub fn design_matrix(tau: ArrayView1<'_, f64>, degree: usize) -> Array2<f64> {
    let mut design = Array2::zeros((tau.len(), degree + 1));
    for (t, &tau_t) in tau.iter().enumerate() {
        let mut power = 1.0;
        for j in 0..=degree {
            design[[t, j]] = power;
            power *= tau_t;
        }
    }
    design
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_softplus_positive_and_stable() {
        assert_relative_eq!(softplus(0.0), 2.0_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(softplus(50.0), 50.0, epsilon = 1e-9);
        assert!(softplus(-50.0) > 0.0);
        assert!(softplus(-745.0) >= 0.0);
        assert!(softplus(745.0).is_finite());
    }

    #[test]
    fn test_sigmoid_matches_softplus_derivative() {
        let h = 1e-6;
        for &x in &[-3.0, -0.5, 0.0, 0.5, 3.0] {
            let numeric = (softplus(x + h) - softplus(x - h)) / (2.0 * h);
            assert_relative_eq!(sigmoid(x), numeric, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_polyval_horner() {
        let coefficients = array![1.0, -2.0, 3.0];
        // 1 - 2*2 + 3*4 = 9
        assert_relative_eq!(polyval(coefficients.view(), 2.0), 9.0);
        assert_relative_eq!(polyval(coefficients.view(), 0.0), 1.0);
    }

    #[test]
    fn test_design_matrix_powers() {
        let tau = array![0.5, 1.0];
        let design = design_matrix(tau.view(), 2);
        assert_eq!(design.dim(), (2, 3));
        assert_relative_eq!(design[[0, 0]], 1.0);
        assert_relative_eq!(design[[0, 2]], 0.25);
        assert_relative_eq!(design[[1, 2]], 1.0);
    }
}
