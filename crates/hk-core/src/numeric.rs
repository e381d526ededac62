use crate::HkError;

/// Floating point type used throughout system
pub type Real = f64;

/// Boltzmann constant in Joules/Kelvin.
pub const KB: Real = 1.3806503e-23;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, HkError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(HkError::NonFinite { what, value: v })
    }
}

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(data: &[Real]) -> Real {
    if data.is_empty() {
        return Real::NAN;
    }
    data.iter().sum::<Real>() / data.len() as Real
}

/// Population standard deviation (numpy's default `ddof=0`).
pub fn std_dev(data: &[Real]) -> Real {
    if data.is_empty() {
        return Real::NAN;
    }
    let m = mean(data);
    let var = data.iter().map(|v| (v - m) * (v - m)).sum::<Real>() / data.len() as Real;
    var.sqrt()
}

/// Maximum ignoring NaNs; `None` if nothing finite-comparable remains.
pub fn nan_max(data: &[Real]) -> Option<Real> {
    data.iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| Some(acc.map_or(v, |a: Real| a.max(v))))
}

/// Evenly spaced samples over `[start, stop]`, like `numpy.linspace`.
pub fn linspace(start: Real, stop: Real, num: usize) -> Vec<Real> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as Real;
            (0..num).map(|i| start + step * i as Real).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn mean_and_std_match_numpy() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(mean(&data), 2.5);
        assert!((std_dev(&data) - 1.118_033_988_749_895).abs() < 1e-12);
    }

    #[test]
    fn nan_max_skips_nan() {
        assert_eq!(nan_max(&[Real::NAN, 1.0, 3.0, Real::NAN]), Some(3.0));
        assert_eq!(nan_max(&[Real::NAN]), None);
    }

    #[test]
    fn linspace_endpoints() {
        let xs = linspace(10e-9, 30e-9, 20);
        assert_eq!(xs.len(), 20);
        assert_eq!(xs[0], 10e-9);
        assert!((xs[19] - 30e-9).abs() < 1e-20);
    }
}
