//! Scalar root finding: Newton-Raphson and the secant method.

use crate::error::{AnalysisError, AnalysisResult};

/// Root finder configuration.
#[derive(Clone, Copy, Debug)]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Absolute tolerance on the step size
    pub abs_tol: f64,
    /// Relative tolerance on the step size
    pub rel_tol: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tol: 1.48e-8,
            rel_tol: 1e-12,
        }
    }
}

/// Root finder result.
#[derive(Clone, Copy, Debug)]
pub struct NewtonResult {
    /// Root estimate
    pub x: f64,
    /// Number of iterations
    pub iterations: usize,
}

impl NewtonConfig {
    fn step_converged(&self, dx: f64, x: f64) -> bool {
        dx.abs() <= self.abs_tol + self.rel_tol * x.abs()
    }
}

/// Newton-Raphson iteration with an analytic derivative.
pub fn newton_raphson<F, D>(f: F, fprime: D, x0: f64, config: &NewtonConfig) -> AnalysisResult<NewtonResult>
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
{
    let mut x = x0;
    for iter in 0..config.max_iterations {
        let fx = f(x);
        if fx == 0.0 {
            return Ok(NewtonResult { x, iterations: iter });
        }
        let dfx = fprime(x);
        if dfx == 0.0 || !dfx.is_finite() {
            return Err(AnalysisError::ConvergenceFailed {
                what: format!("derivative vanished at x = {x} (iteration {iter})"),
            });
        }
        let dx = fx / dfx;
        let x_new = x - dx;
        if !x_new.is_finite() {
            return Err(AnalysisError::Numeric {
                what: format!("Newton step left the finite domain from x = {x}"),
            });
        }
        x = x_new;
        if config.step_converged(dx, x) {
            return Ok(NewtonResult {
                x,
                iterations: iter + 1,
            });
        }
    }

    Err(AnalysisError::ConvergenceFailed {
        what: format!(
            "Maximum iterations {} reached, x = {}",
            config.max_iterations, x
        ),
    })
}

/// Secant iteration seeded like `scipy.optimize.newton` without a derivative.
pub fn secant<F>(f: F, x0: f64, config: &NewtonConfig) -> AnalysisResult<NewtonResult>
where
    F: Fn(f64) -> f64,
{
    let delta = if x0 >= 0.0 { 1e-4 } else { -1e-4 };
    let mut p0 = x0;
    let mut p1 = x0 * (1.0 + 1e-4) + delta;
    let mut q0 = f(p0);
    let mut q1 = f(p1);
    for iter in 0..config.max_iterations {
        if q1 == q0 {
            if p1 != p0 {
                return Err(AnalysisError::ConvergenceFailed {
                    what: format!("secant slope vanished between {p0} and {p1}"),
                });
            }
            return Ok(NewtonResult {
                x: (p1 + p0) / 2.0,
                iterations: iter,
            });
        }
        let p = p1 - q1 * (p1 - p0) / (q1 - q0);
        if !p.is_finite() {
            return Err(AnalysisError::Numeric {
                what: format!("secant step left the finite domain from x = {p1}"),
            });
        }
        if config.step_converged(p - p1, p) {
            return Ok(NewtonResult {
                x: p,
                iterations: iter + 1,
            });
        }
        p0 = p1;
        q0 = q1;
        p1 = p;
        q1 = f(p1);
    }

    Err(AnalysisError::ConvergenceFailed {
        what: format!(
            "Maximum iterations {} reached, x = {}",
            config.max_iterations, p1
        ),
    })
}
