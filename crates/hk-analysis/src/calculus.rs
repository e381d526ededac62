//! Discrete differentiation.

use std::collections::BTreeMap;

use hk_core::Real;

use crate::error::{AnalysisError, AnalysisResult};

/// Central differencing: `{-1: -0.5, 1: 0.5}`.
pub fn central_weights() -> BTreeMap<i64, Real> {
    BTreeMap::from([(-1, -0.5), (1, 0.5)])
}

/// Weighted finite-difference derivative of `f` with respect to `x`.
///
/// For each point `i`, `df = sum(w_k * f[i+k])` and `dx = sum(w_k * x[i+k])`
/// with indices clamped to the array bounds; the result is `df / dx`.
pub fn derivative(
    x: &[Real],
    f: &[Real],
    weights: &BTreeMap<i64, Real>,
) -> AnalysisResult<Vec<Real>> {
    if x.len() != f.len() {
        return Err(AnalysisError::InvalidInput {
            what: format!("x has {} points but f has {}", x.len(), f.len()),
        });
    }
    if weights.is_empty() {
        return Err(AnalysisError::InvalidInput {
            what: "empty weight dictionary".to_string(),
        });
    }
    let n = x.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let last = (n - 1) as i64;
    let out = (0..n)
        .map(|i| {
            let (mut df, mut dx) = (0.0, 0.0);
            for (&offset, &w) in weights {
                let j = (i as i64 + offset).clamp(0, last) as usize;
                df += w * f[j];
                dx += w * x[j];
            }
            df / dx
        })
        .collect();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_of_parabola() {
        let x: Vec<Real> = (0..11).map(|i| i as Real).collect();
        let f: Vec<Real> = x.iter().map(|v| v * v).collect();
        let d = derivative(&x, &f, &central_weights()).unwrap();
        // interior points are exact for a quadratic
        assert!((d[5] - 10.0).abs() < 1e-12);
        // clamped edges degrade to one-sided differences
        assert!((d[0] - 1.0).abs() < 1e-12);
        assert!((d[10] - 19.0).abs() < 1e-12);
    }

    #[test]
    fn derivative_rejects_mismatched_lengths() {
        assert!(derivative(&[0.0, 1.0], &[0.0], &central_weights()).is_err());
    }
}
