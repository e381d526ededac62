//! Finite difference Jacobian computation.

use crate::error::AnalysisResult;
use nalgebra::{DMatrix, DVector};

/// Forward-difference step for one parameter, MINPACK style.
///
/// `epsfcn` is the expected relative error of the function values; the step
/// is `sqrt(epsfcn) * |x|`, or `sqrt(epsfcn)` when `x` is zero.
pub fn forward_step(x: f64, epsfcn: f64) -> f64 {
    let eps = epsfcn.max(f64::EPSILON).sqrt();
    let h = eps * x.abs();
    if h == 0.0 { eps } else { h }
}

/// Compute Jacobian using forward finite differences.
///
/// `f_x` is `f(x)`, passed in because callers already have it.
pub fn finite_difference_jacobian<F>(
    x: &DVector<f64>,
    f_x: &DVector<f64>,
    f: F,
    epsfcn: f64,
) -> AnalysisResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> AnalysisResult<DVector<f64>>,
{
    let n = x.len();
    let m = f_x.len();

    let mut jac = DMatrix::zeros(m, n);

    for j in 0..n {
        let mut x_perturbed = x.clone();
        let dx = forward_step(x[j], epsfcn);
        x_perturbed[j] += dx;

        let f_perturbed = f(&x_perturbed)?;
        let df = (f_perturbed - f_x) / dx;
        jac.set_column(j, &df);
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jacobian_linear() {
        // f(x) = 2*x, J = 2
        let f = |x: &DVector<f64>| -> AnalysisResult<DVector<f64>> {
            Ok(DVector::from_element(1, 2.0 * x[0]))
        };

        let x = DVector::from_element(1, 3.0);
        let fx = f(&x).unwrap();
        let jac = finite_difference_jacobian(&x, &fx, f, f64::EPSILON).unwrap();

        assert!((jac[(0, 0)] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn jacobian_two_outputs() {
        // f(x, y) = (x*y, x + y)
        let f = |v: &DVector<f64>| -> AnalysisResult<DVector<f64>> {
            Ok(DVector::from_vec(vec![v[0] * v[1], v[0] + v[1]]))
        };

        let x = DVector::from_vec(vec![2.0, 5.0]);
        let fx = f(&x).unwrap();
        let jac = finite_difference_jacobian(&x, &fx, f, 1e-12).unwrap();

        assert!((jac[(0, 0)] - 5.0).abs() < 1e-4);
        assert!((jac[(0, 1)] - 2.0).abs() < 1e-4);
        assert!((jac[(1, 0)] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn zero_parameter_still_steps() {
        assert!(forward_step(0.0, 1e-3) > 0.0);
        assert!((forward_step(2.0, 1e-4) - 0.02).abs() < 1e-15);
    }
}
