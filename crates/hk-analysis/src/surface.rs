//! Surface contact point detection for velocity-clamp curves.
//!
//! Two algorithms are available:
//! - `wtk`: fit a continuous bilinear model (contact slope, kink, non-contact
//!   slope) to the deflection signal and sanity-check the result;
//! - `fmms`: find a flat baseline in the non-contact tail and slide in from
//!   the contact side until the deflection rises above it.

use std::fmt;
use std::str::FromStr;

use hk_core::{Info, Real, Value, mean, std_dev};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalysisError, AnalysisResult};
use crate::fit::{FitConfig, FitReport, ModelFitter};
use crate::poly::linregress;

/// Which algorithm locates the contact point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactAlgorithm {
    #[default]
    Wtk,
    Fmms,
}

impl FromStr for ContactAlgorithm {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wtk" => Ok(ContactAlgorithm::Wtk),
            "fmms" => Ok(ContactAlgorithm::Fmms),
            other => Err(AnalysisError::InvalidInput {
                what: format!("unknown surface contact point algorithm '{other}' (expected wtk or fmms)"),
            }),
        }
    }
}

impl fmt::Display for ContactAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContactAlgorithm::Wtk => "wtk",
            ContactAlgorithm::Fmms => "fmms",
        })
    }
}

/// Thresholds a bilinear fit must pass to count as good.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurfaceFitChecks {
    /// Minimum `contact slope / non-contact slope` ratio
    pub min_slope_ratio: Real,
    /// Minimum fraction of points in the contact region
    pub min_contact_fraction: Real,
    /// Maximum fraction of points in the contact region
    pub max_contact_fraction: Real,
    /// Minimum `fitted contact slope / guessed contact slope` ratio
    pub min_slope_guess_ratio: Real,
}

impl Default for SurfaceFitChecks {
    fn default() -> Self {
        Self {
            min_slope_ratio: 10.0,
            min_contact_fraction: 0.02,
            max_contact_fraction: 0.98,
            min_slope_guess_ratio: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SurfaceOptions {
    /// Pin the non-contact slope at zero.
    pub force_zero_non_contact_slope: bool,
    /// Points before this index in the non-contact region do not count
    /// towards the residual.
    pub ignore_non_contact_before_index: Option<usize>,
    pub checks: SurfaceFitChecks,
}

/// Continuous bilinear surface position model.
///
/// ```text
/// y = p0 + p1 i                     for i <= p2
/// y = p0 + p1 p2 + p3 (i - p2)      for i >= p2
/// ```
///
/// The contact region is assumed to lie left of (at lower indices than) the
/// non-contact region, and tip-surface attraction to give positive
/// deflection.
pub struct SurfacePositionModel<'a> {
    data: &'a [Real],
    options: SurfaceOptions,
    min_deflection: Real,
    max_deflection: Real,
}

/// Fitted bilinear parameters, in per-index units.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceFit {
    pub offset: Real,
    pub contact_slope: Real,
    pub surface_index: Real,
    pub non_contact_slope: Real,
    pub guessed_contact_slope: Real,
    pub report: FitReport,
}

impl<'a> SurfacePositionModel<'a> {
    pub fn new(data: &'a [Real], options: SurfaceOptions) -> AnalysisResult<Self> {
        if data.len() < 4 {
            return Err(AnalysisError::InvalidInput {
                what: format!("need at least 4 deflection points, got {}", data.len()),
            });
        }
        let (min_deflection, max_deflection) = data
            .iter()
            .fold((Real::INFINITY, Real::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        Ok(Self {
            data,
            options,
            min_deflection,
            max_deflection,
        })
    }

    fn full_params(&self, params: &[Real]) -> [Real; 4] {
        let p3 = if self.options.force_zero_non_contact_slope {
            0.0
        } else {
            params.get(3).copied().unwrap_or(0.0)
        };
        [params[0], params[1], params[2], p3]
    }

    /// Initial parameters and the guessed contact slope.
    fn guess(&self) -> AnalysisResult<([Real; 4], Real)> {
        let data = self.data;
        let n = data.len();
        let range = self.max_deflection - self.min_deflection;
        let middle = self.min_deflection + range / 2.0;
        let first_above = data.iter().position(|v| *v > middle).unwrap_or(0);
        let mut left_offset = self.min_deflection;
        let mut kink = 2.0 * first_above as Real;
        let left_slope;
        if first_above == 0 {
            // jump vibration at the start of the retraction?
            let start = (0.01 * n as Real).max(20.0).min(0.5 * n as Real) as usize;
            let std = std_dev(&data[..start]);
            left_offset = data[start];
            let mut stop = start;
            while stop < n && (data[stop] - left_offset).abs() < 3.0 * std {
                stop += 1;
            }
            if stop == start || stop == n {
                return Err(AnalysisError::poor_fit(
                    "cannot locate the contact region after the start-up vibration",
                ));
            }
            left_slope = (mean(&data[stop - start..stop]) - left_offset) / (stop - start) as Real;
            left_offset -= left_slope * start as Real / 2.0;
            kink = (data[n - 1] - left_offset) / left_slope;
        } else {
            left_slope = (data[n - 1] - self.min_deflection) / kink;
        }
        if left_slope == 0.0 || !left_slope.is_finite() || !kink.is_finite() {
            return Err(AnalysisError::poor_fit(format!(
                "no usable contact slope guess (slope {left_slope}, kink {kink})"
            )));
        }
        Ok(([left_offset, left_slope, kink, 0.0], left_slope))
    }

    pub fn fit_surface(&self) -> AnalysisResult<SurfaceFit> {
        let (guess, guessed_slope) = self.guess()?;
        let initial = if self.options.force_zero_non_contact_slope {
            guess[..3].to_vec()
        } else {
            guess.to_vec()
        };
        let report = self.fit_from(initial, &self.fit_config())?;
        let mut p = self.full_params(&report.params);
        p[2] = p[2].abs();
        let fit = SurfaceFit {
            offset: p[0],
            contact_slope: p[1],
            surface_index: p[2],
            non_contact_slope: p[3],
            guessed_contact_slope: guessed_slope,
            report,
        };
        self.check(&fit)?;
        Ok(fit)
    }

    fn check(&self, fit: &SurfaceFit) -> AnalysisResult<()> {
        let checks = &self.options.checks;
        let slope_ratio = (fit.contact_slope / fit.non_contact_slope).abs();
        if !(slope_ratio >= checks.min_slope_ratio) {
            return Err(AnalysisError::poor_fit(format!(
                "Slope in non-contact region, or no slope in contact (slope ratio {slope_ratio} less than {})",
                checks.min_slope_ratio
            )));
        }
        let contact_fraction = fit.surface_index / self.data.len() as Real;
        if !(contact_fraction >= checks.min_contact_fraction) {
            return Err(AnalysisError::poor_fit(format!(
                "No kink (contact fraction {contact_fraction} less than {})",
                checks.min_contact_fraction
            )));
        }
        if contact_fraction > checks.max_contact_fraction {
            return Err(AnalysisError::poor_fit(format!(
                "No kink (contact fraction {contact_fraction} greater than {})",
                checks.max_contact_fraction
            )));
        }
        let slope_guess_ratio = (fit.contact_slope / fit.guessed_contact_slope).abs();
        if !(slope_guess_ratio >= checks.min_slope_guess_ratio) {
            return Err(AnalysisError::poor_fit(format!(
                "Too far (contact slope off guess by {slope_guess_ratio} less than {})",
                checks.min_slope_guess_ratio
            )));
        }
        Ok(())
    }
}

impl ModelFitter for SurfacePositionModel<'_> {
    fn data(&self) -> &[Real] {
        self.data
    }

    fn model(&self, params: &[Real]) -> AnalysisResult<Vec<Real>> {
        let p = self.full_params(params);
        let n = self.data.len();
        let kink = p[2].abs().round();
        let r2 = if kink.is_finite() { (kink as usize).min(n) } else { n };
        let mut out = Vec::with_capacity(n);
        out.extend((0..r2).map(|i| p[0] + p[1] * i as Real));
        out.extend((0..n - r2).map(|j| p[0] + p[1] * p[2] + p[3] * j as Real));
        if let Some(ignore) = self.options.ignore_non_contact_before_index {
            let ignore = ignore.min(n);
            if r2 < ignore {
                out[r2..ignore].copy_from_slice(&self.data[r2..ignore]);
            }
        }
        Ok(out)
    }

    fn guess_initial_params(&self) -> AnalysisResult<Vec<Real>> {
        let (guess, _) = self.guess()?;
        Ok(if self.options.force_zero_non_contact_slope {
            guess[..3].to_vec()
        } else {
            guess.to_vec()
        })
    }

    /// Big Jacobian steps, so noise-generated local minima don't trap the fit.
    fn fit_config(&self) -> FitConfig {
        FitConfig {
            epsfcn: 1e-3,
            ..FitConfig::default()
        }
    }
}

/// A located contact point.
#[derive(Clone, Debug, PartialEq)]
pub struct ContactPoint {
    pub index: usize,
    pub deflection_offset: Real,
    pub info: Info,
}

/// Bilinear-fit contact point. Approach curves (decreasing `z`) are
/// reversed before fitting so the contact region sits on the left.
pub fn find_contact_point_wtk(
    z: &[Real],
    deflection: &[Real],
    options: SurfaceOptions,
) -> AnalysisResult<ContactPoint> {
    if z.len() != deflection.len() || z.len() < 2 {
        return Err(AnalysisError::InvalidInput {
            what: format!(
                "distance ({}) and deflection ({}) must have equal length of at least two",
                z.len(),
                deflection.len()
            ),
        });
    }
    let n = z.len();
    let reversed = z[0] > z[n - 1];
    let d: Vec<Real> = if reversed {
        deflection.iter().rev().copied().collect()
    } else {
        deflection.to_vec()
    };
    let fit = SurfacePositionModel::new(&d, options)?.fit_surface()?;
    let deflection_offset = fit.offset + fit.contact_slope * fit.surface_index;
    let delta_pos_per_point = z[1] - z[0];
    let mut info = Info::new();
    info.insert("offset".into(), Value::from(fit.offset));
    info.insert(
        "contact slope".into(),
        Value::from(fit.contact_slope / delta_pos_per_point),
    );
    info.insert("surface index".into(), Value::from(fit.surface_index));
    info.insert(
        "non-contact slope".into(),
        Value::from(fit.non_contact_slope / delta_pos_per_point),
    );
    info.insert("reversed".into(), Value::from(reversed));
    let mut surface_index = fit.surface_index;
    if reversed {
        surface_index = (n - 1) as Real - surface_index;
    }
    let index = surface_index.round().clamp(0.0, (n - 1) as Real) as usize;
    debug!(index, deflection_offset, reversed, "wtk contact point");
    Ok(ContactPoint {
        index,
        deflection_offset,
        info,
    })
}

/// Baseline contact point: fit the non-contact half to a line, shrinking it
/// until the line is nearly flat, average it into a baseline, then take the
/// first point at or above the baseline.
pub fn find_contact_point_fmms(z: &[Real], deflection: &[Real]) -> AnalysisResult<ContactPoint> {
    let n = deflection.len();
    if z.len() != n || n < 4 {
        return Err(AnalysisError::InvalidInput {
            what: format!(
                "distance ({}) and deflection ({}) must have equal length of at least four",
                z.len(),
                n
            ),
        });
    }
    let mut selection_start = n / 2;
    loop {
        let (slope, _) = linregress(&z[selection_start..], &deflection[selection_start..])?;
        // nearly horizontal, or running out of tail
        if slope.abs() < 0.1
            || selection_start as Real > 5.0 / 6.0 * n as Real
            || selection_start + 10 >= n - 1
        {
            break;
        }
        selection_start += 10;
    }
    let baseline = mean(&deflection[selection_start..]);
    let index = deflection
        .iter()
        .position(|d| *d >= baseline)
        .ok_or_else(|| AnalysisError::poor_fit("no deflection reaches the baseline"))?;
    debug!(index, baseline, "fmms contact point");
    Ok(ContactPoint {
        index,
        deflection_offset: baseline,
        info: Info::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Retraction-like curve: steep contact region, then flat with a little
    /// deterministic noise.
    fn bilinear(n: usize, kink: usize) -> (Vec<Real>, Vec<Real>) {
        let z: Vec<Real> = (0..n).map(|i| i as Real * 1e-9).collect();
        let d = (0..n)
            .map(|i| {
                let wiggle = 1e-12 * (((i * 37) % 11) as Real - 5.0);
                if i < kink {
                    -1e-9 + 1e-11 * i as Real + wiggle
                } else {
                    -1e-9 + 1e-11 * kink as Real + wiggle
                }
            })
            .collect();
        (z, d)
    }

    #[test]
    fn wtk_finds_kink() {
        let (z, d) = bilinear(200, 60);
        let cp = find_contact_point_wtk(&z, &d, SurfaceOptions::default()).unwrap();
        assert!((cp.index as i64 - 60).abs() <= 2, "index {}", cp.index);
        assert_eq!(cp.info.get("reversed"), Some(&Value::Bool(false)));
    }

    #[test]
    fn wtk_handles_approach_direction() {
        let (z, d) = bilinear(200, 60);
        let z_rev: Vec<Real> = z.iter().rev().copied().collect();
        let d_rev: Vec<Real> = d.iter().rev().copied().collect();
        let cp = find_contact_point_wtk(&z_rev, &d_rev, SurfaceOptions::default()).unwrap();
        assert!((cp.index as i64 - 139).abs() <= 2, "index {}", cp.index);
    }

    #[test]
    fn flat_signal_is_poor_fit() {
        let z: Vec<Real> = (0..100).map(|i| i as Real).collect();
        let d: Vec<Real> = (0..100).map(|i| ((i * 37) % 11) as Real).collect();
        let err = find_contact_point_wtk(&z, &d, SurfaceOptions::default()).unwrap_err();
        assert!(err.is_poor_fit(), "{err}");
    }

    #[test]
    fn fmms_finds_baseline_crossing() {
        let (z, d) = bilinear(200, 60);
        let cp = find_contact_point_fmms(&z, &d).unwrap();
        assert!(cp.index > 50 && cp.index <= 62, "index {}", cp.index);
    }

    #[test]
    fn algorithm_names_parse() {
        assert_eq!("fmms".parse::<ContactAlgorithm>().unwrap(), ContactAlgorithm::Fmms);
        assert!("ms".parse::<ContactAlgorithm>().is_err());
    }
}
