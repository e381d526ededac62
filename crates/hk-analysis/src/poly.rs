//! Least-squares polynomials and straight-line regression.

use hk_core::Real;
use nalgebra::{DMatrix, DVector};

use crate::error::{AnalysisError, AnalysisResult};

/// Least-squares polynomial fit, coefficients highest power first.
pub fn polyfit(x: &[Real], y: &[Real], degree: usize) -> AnalysisResult<Vec<Real>> {
    if x.len() != y.len() {
        return Err(AnalysisError::InvalidInput {
            what: format!("x has {} points but y has {}", x.len(), y.len()),
        });
    }
    if x.len() <= degree {
        return Err(AnalysisError::InvalidInput {
            what: format!(
                "need more than {degree} points for a degree {degree} polynomial, got {}",
                x.len()
            ),
        });
    }
    let cols = degree + 1;
    let vander = DMatrix::from_fn(x.len(), cols, |i, j| x[i].powi((degree - j) as i32));
    let rhs = DVector::from_column_slice(y);
    let coeffs = vander
        .svd(true, true)
        .solve(&rhs, Real::EPSILON)
        .map_err(|e| AnalysisError::Numeric {
            what: format!("polynomial least squares failed: {e}"),
        })?;
    Ok(coeffs.iter().copied().collect())
}

/// Evaluate a polynomial (highest power first) with Horner's rule.
pub fn polyval(coeffs: &[Real], x: Real) -> Real {
    coeffs.iter().fold(0.0, |acc, c| acc * x + c)
}

/// `(slope, intercept)` of the least-squares line through the points.
pub fn linregress(x: &[Real], y: &[Real]) -> AnalysisResult<(Real, Real)> {
    let c = polyfit(x, y, 1)?;
    Ok((c[0], c[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_quadratic() {
        let x: Vec<Real> = (0..20).map(|i| i as Real * 0.1).collect();
        let y: Vec<Real> = x.iter().map(|v| 2.0 * v * v - 3.0 * v + 0.5).collect();
        let c = polyfit(&x, &y, 2).unwrap();
        assert!((c[0] - 2.0).abs() < 1e-9);
        assert!((c[1] + 3.0).abs() < 1e-9);
        assert!((c[2] - 0.5).abs() < 1e-9);
        assert!((polyval(&c, 1.0) - (-0.5)).abs() < 1e-9);
    }

    #[test]
    fn too_few_points() {
        assert!(polyfit(&[1.0], &[2.0], 1).is_err());
    }
}
