//! Nonlinear least-squares model fitting (Levenberg-Marquardt).
//!
//! A `ModelFitter` supplies measured data, a forward model and an initial
//! guess. `ModelFitter::fit` rescales the parameters so every one starts at
//! magnitude one, normalizes residuals by the data spread, and hands the
//! problem to [`levenberg_marquardt`].

use hk_core::{Info, Real, Value, std_dev};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::jacobian::finite_difference_jacobian;

/// Levenberg-Marquardt configuration.
#[derive(Clone, Copy, Debug)]
pub struct FitConfig {
    /// Maximum outer iterations
    pub max_iterations: usize,
    /// Relative error of the residual function; sets the Jacobian step
    pub epsfcn: f64,
    /// Relative tolerance on the parameter step
    pub xtol: f64,
    /// Relative tolerance on the cost reduction
    pub ftol: f64,
    /// Absolute tolerance on the gradient infinity-norm
    pub gtol: f64,
    /// Initial damping relative to the largest diagonal of `J^T J`
    pub initial_damping: f64,
    /// Rescale parameters and residuals before optimizing
    pub rescale: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            epsfcn: f64::EPSILON,
            xtol: 1.49012e-8,
            ftol: 1.49012e-8,
            gtol: 0.0,
            initial_damping: 1e-3,
            rescale: true,
        }
    }
}

/// Raw optimizer outcome, in the optimizer's own coordinates.
#[derive(Clone, Debug)]
pub struct LmOutcome {
    pub x: DVector<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
    pub message: String,
}

fn all_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Minimize `0.5 * |r(x)|^2` starting from `x0`.
///
/// Trial points whose residuals fail to evaluate or are non-finite are
/// rejected like any other uphill step. A non-finite residual at `x0` is a `PoorFit`.
pub fn levenberg_marquardt<F>(
    x0: DVector<f64>,
    residual_fn: F,
    config: &FitConfig,
) -> AnalysisResult<LmOutcome>
where
    F: Fn(&DVector<f64>) -> AnalysisResult<DVector<f64>>,
{
    let mut x = x0;
    let mut r = residual_fn(&x)?;
    let mut evaluations = 1;
    if !all_finite(&r) {
        return Err(AnalysisError::poor_fit(
            "model is not finite at the initial parameters",
        ));
    }
    let mut cost = 0.5 * r.norm_squared();
    let mut mu: Option<f64> = None;

    for iter in 0..config.max_iterations {
        if cost == 0.0 {
            return Ok(LmOutcome {
                x,
                cost,
                iterations: iter,
                evaluations,
                converged: true,
                message: "exact fit".to_string(),
            });
        }

        let jac = finite_difference_jacobian(&x, &r, &residual_fn, config.epsfcn)?;
        evaluations += x.len();
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::poor_fit(format!(
                "non-finite Jacobian at iteration {iter}"
            )));
        }
        let jtj = jac.transpose() * &jac;
        let g = jac.transpose() * &r;
        if g.amax() <= config.gtol {
            return Ok(LmOutcome {
                x,
                cost,
                iterations: iter,
                evaluations,
                converged: true,
                message: "gradient below tolerance".to_string(),
            });
        }

        let max_diag = jtj.diagonal().amax().max(f64::MIN_POSITIVE);
        let floor = max_diag * 1e-12;
        let damping = *mu.get_or_insert(config.initial_damping);
        let mut lambda = damping;
        let mut accepted = false;

        for _ in 0..30 {
            let mut a = jtj.clone();
            for i in 0..a.nrows() {
                a[(i, i)] += lambda * jtj[(i, i)].max(floor);
            }
            let Some(step) = solve_normal(a, -&g) else {
                lambda *= 10.0;
                continue;
            };
            let x_new = &x + &step;
            evaluations += 1;
            let r_new = match residual_fn(&x_new) {
                Ok(r) => r,
                Err(e) => {
                    debug!(error = %e, "rejecting trial step");
                    lambda *= 10.0;
                    continue;
                }
            };
            let cost_new = 0.5 * r_new.norm_squared();
            if !all_finite(&r_new) || !cost_new.is_finite() || cost_new >= cost {
                lambda *= 10.0;
                continue;
            }

            let reduction = cost - cost_new;
            let step_small = step.norm() <= config.xtol * (x.norm() + config.xtol);
            x = x_new;
            r = r_new;
            cost = cost_new;
            mu = Some((lambda / 10.0).max(1e-15));
            accepted = true;

            if step_small || reduction <= config.ftol * (cost + reduction) {
                debug!(iter, cost, "least squares converged");
                return Ok(LmOutcome {
                    x,
                    cost,
                    iterations: iter + 1,
                    evaluations,
                    converged: true,
                    message: if step_small {
                        "parameter step below tolerance".to_string()
                    } else {
                        "cost reduction below tolerance".to_string()
                    },
                });
            }
            break;
        }

        if !accepted {
            // No downhill step at any damping: we are at a minimum to
            // within the residual precision.
            return Ok(LmOutcome {
                x,
                cost,
                iterations: iter + 1,
                evaluations,
                converged: true,
                message: "no further reduction possible".to_string(),
            });
        }
    }

    Ok(LmOutcome {
        x,
        cost,
        iterations: config.max_iterations,
        evaluations,
        converged: false,
        message: format!("maximum iterations {} reached", config.max_iterations),
    })
}

fn solve_normal(a: DMatrix<f64>, b: DVector<f64>) -> Option<DVector<f64>> {
    match a.clone().cholesky() {
        Some(chol) => Some(chol.solve(&b)),
        None => a.lu().solve(&b),
    }
    .filter(all_finite)
}

/// Everything we know about a finished fit.
#[derive(Clone, Debug, PartialEq)]
pub struct FitReport {
    pub initial_params: Vec<Real>,
    pub scale: Vec<Real>,
    /// Fitted parameters in model coordinates (before any
    /// model-specific back transformation).
    pub params: Vec<Real>,
    pub rms_residual: Real,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
    pub message: String,
}

impl FitReport {
    pub fn to_info(&self) -> Info {
        let mut info = Info::new();
        info.insert(
            "initial parameters".into(),
            Value::from(self.initial_params.clone()),
        );
        info.insert("scale".into(), Value::from(self.scale.clone()));
        info.insert("fitted parameters".into(), Value::from(self.params.clone()));
        info.insert("rms residual".into(), Value::from(self.rms_residual));
        info.insert("iterations".into(), Value::from(self.iterations));
        info.insert("function evaluations".into(), Value::from(self.evaluations));
        info.insert("convergence flag".into(), Value::from(self.converged));
        info.insert("message".into(), Value::from(self.message.as_str()));
        info
    }
}

/// Root-mean-square of `data - model`.
pub fn rms_residual(data: &[Real], model: &[Real]) -> Real {
    if data.is_empty() {
        return 0.0;
    }
    let ss: Real = data
        .iter()
        .zip(model)
        .map(|(d, m)| (d - m) * (d - m))
        .sum();
    (ss / data.len() as Real).sqrt()
}

/// Any failure while evaluating a model during a fit means the data does not
/// fit the model.
fn as_poor_fit(err: AnalysisError) -> AnalysisError {
    if err.is_poor_fit() {
        err
    } else {
        AnalysisError::poor_fit(err.to_string())
    }
}

/// A model that can be fitted to measured data by least squares.
pub trait ModelFitter {
    /// Measured values the model is compared with.
    fn data(&self) -> &[Real];

    /// Model prediction for every data point.
    fn model(&self, params: &[Real]) -> AnalysisResult<Vec<Real>>;

    fn guess_initial_params(&self) -> AnalysisResult<Vec<Real>>;

    /// Per-parameter scale factors; zeros become one.
    fn guess_scale(&self, params: &[Real]) -> Vec<Real> {
        params
            .iter()
            .map(|p| if *p == 0.0 || !p.is_finite() { 1.0 } else { p.abs() })
            .collect()
    }

    fn fit_config(&self) -> FitConfig {
        FitConfig::default()
    }

    fn fit(&self) -> AnalysisResult<FitReport> {
        let initial = self.guess_initial_params().map_err(as_poor_fit)?;
        self.fit_from(initial, &self.fit_config())
    }

    fn fit_from(&self, initial: Vec<Real>, config: &FitConfig) -> AnalysisResult<FitReport> {
        if initial.iter().any(|p| !p.is_finite()) {
            return Err(AnalysisError::poor_fit(format!(
                "non-finite initial parameters {initial:?}"
            )));
        }
        let data = self.data();
        let (scale, data_scale) = if config.rescale {
            let spread = std_dev(data);
            let data_scale = if spread > 0.0 && spread.is_finite() {
                spread
            } else {
                1.0
            };
            (self.guess_scale(&initial), data_scale)
        } else {
            (vec![1.0; initial.len()], 1.0)
        };

        let unscale = |u: &DVector<f64>| -> Vec<Real> {
            u.iter().zip(&scale).map(|(u, s)| u * s).collect()
        };
        let residual = |u: &DVector<f64>| -> AnalysisResult<DVector<f64>> {
            let model = self.model(&unscale(u)).map_err(as_poor_fit)?;
            Ok(DVector::from_iterator(
                data.len(),
                data.iter().zip(&model).map(|(d, m)| (d - m) / data_scale),
            ))
        };

        let u0 = DVector::from_iterator(
            initial.len(),
            initial.iter().zip(&scale).map(|(p, s)| p / s),
        );
        let outcome = levenberg_marquardt(u0, residual, config)?;
        if !outcome.converged {
            warn!(message = %outcome.message, "least squares fit did not converge");
        }
        let params = unscale(&outcome.x);
        let model = self.model(&params).map_err(as_poor_fit)?;
        let rms = rms_residual(data, &model);
        if !rms.is_finite() {
            return Err(AnalysisError::poor_fit("non-finite residual after fit"));
        }
        debug!(?params, rms, iterations = outcome.iterations, "fit finished");
        Ok(FitReport {
            initial_params: initial,
            scale,
            params,
            rms_residual: rms,
            iterations: outcome.iterations,
            evaluations: outcome.evaluations,
            converged: outcome.converged,
            message: outcome.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Line {
        x: Vec<Real>,
        y: Vec<Real>,
    }

    impl ModelFitter for Line {
        fn data(&self) -> &[Real] {
            &self.y
        }

        fn model(&self, p: &[Real]) -> AnalysisResult<Vec<Real>> {
            Ok(self.x.iter().map(|x| p[0] * x + p[1]).collect())
        }

        fn guess_initial_params(&self) -> AnalysisResult<Vec<Real>> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct Decay {
        t: Vec<Real>,
        y: Vec<Real>,
    }

    impl ModelFitter for Decay {
        fn data(&self) -> &[Real] {
            &self.y
        }

        fn model(&self, p: &[Real]) -> AnalysisResult<Vec<Real>> {
            Ok(self.t.iter().map(|t| p[0] * (-t / p[1]).exp()).collect())
        }

        fn guess_initial_params(&self) -> AnalysisResult<Vec<Real>> {
            Ok(vec![1.0, 1.0])
        }
    }

    #[test]
    fn fits_line() {
        let x: Vec<Real> = (0..10).map(|i| i as Real).collect();
        let y = x.iter().map(|x| 3.0 * x - 2.0).collect();
        let report = Line { x, y }.fit().unwrap();
        assert!(report.converged);
        assert!((report.params[0] - 3.0).abs() < 1e-6);
        assert!((report.params[1] + 2.0).abs() < 1e-6);
        assert!(report.rms_residual < 1e-6);
    }

    #[test]
    fn fits_exponential_decay() {
        let t: Vec<Real> = (0..40).map(|i| i as Real * 0.25).collect();
        let y = t.iter().map(|t| 5.0 * (-t / 2.5).exp()).collect();
        let report = Decay { t, y }.fit().unwrap();
        assert!((report.params[0] - 5.0).abs() < 1e-5);
        assert!((report.params[1] - 2.5).abs() < 1e-5);
    }

    #[test]
    fn non_finite_start_is_poor_fit() {
        let fitter = Decay {
            t: vec![0.0, 1.0],
            y: vec![1.0, 0.5],
        };
        let err = fitter
            .fit_from(vec![1.0, 0.0], &FitConfig::default())
            .unwrap_err();
        assert!(err.is_poor_fit());
    }

    struct Brittle {
        y: Vec<Real>,
    }

    impl ModelFitter for Brittle {
        fn data(&self) -> &[Real] {
            &self.y
        }

        fn model(&self, p: &[Real]) -> AnalysisResult<Vec<Real>> {
            if p[0] > 1.5 {
                return Err(AnalysisError::Numeric {
                    what: "model outside its domain".into(),
                });
            }
            Ok(vec![p[0]; self.y.len()])
        }

        fn guess_initial_params(&self) -> AnalysisResult<Vec<Real>> {
            Ok(vec![2.0])
        }
    }

    #[test]
    fn model_errors_are_poor_fits() {
        let err = Brittle { y: vec![1.0, 1.0] }.fit().unwrap_err();
        assert!(err.is_poor_fit(), "{err}");
    }

    #[test]
    fn report_info_keys() {
        let x: Vec<Real> = (0..5).map(|i| i as Real).collect();
        let y = x.clone();
        let info = Line { x, y }.fit().unwrap().to_info();
        assert!(info.contains_key("fitted parameters"));
        assert_eq!(info.get("convergence flag"), Some(&Value::Bool(true)));
    }
}
