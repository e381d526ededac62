//! Noise estimation and peak detection on 1-D signals.
//!
//! The pipeline is `noise` -> `above_noise` -> `mask_to_peaks` ->
//! `merge_double_peaks` -> `drop_narrow_peaks`. Every stage is a pure
//! function; `find_peaks` chains them with a `PeakSettings` record.

use std::fmt;
use std::str::FromStr;

use hk_core::{Info, Real, Value, mean, std_dev};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalysisError, AnalysisResult};

/// Which side(s) of the noise mean a stage looks at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Both,
    Positive,
    Negative,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Both => "both",
            Side::Positive => "positive",
            Side::Negative => "negative",
        }
    }

    fn deviation(self, value: Real, mean: Real) -> Real {
        match self {
            Side::Both => (value - mean).abs(),
            Side::Positive => value - mean,
            Side::Negative => mean - value,
        }
    }
}

impl FromStr for Side {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "both" => Ok(Side::Both),
            "positive" => Ok(Side::Positive),
            "negative" => Ok(Side::Negative),
            other => Err(AnalysisError::InvalidInput {
                what: format!("unknown side '{other}' (expected both, positive or negative)"),
            }),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous run `[index, index + values.len())` of a signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub name: String,
    pub index: usize,
    pub values: Vec<Real>,
}

impl Peak {
    pub fn new(name: impl Into<String>, index: usize, values: Vec<Real>) -> Self {
        Self {
            name: name.into(),
            index,
            values,
        }
    }

    /// First index past the end of the peak.
    pub fn post_index(&self) -> usize {
        self.index + self.values.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_value(&self) -> Value {
        let mut map = Info::new();
        map.insert("name".into(), Value::from(self.name.as_str()));
        map.insert("index".into(), Value::from(self.index));
        map.insert("values".into(), Value::from(self.values.clone()));
        Value::Map(map)
    }

    pub fn from_value(value: &Value) -> AnalysisResult<Self> {
        let bad = |what: &str| AnalysisError::InvalidInput {
            what: format!("peak record {what}"),
        };
        let map = value.as_map().ok_or_else(|| bad("is not a mapping"))?;
        let name = map
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| bad("has no name"))?;
        let index = map
            .get("index")
            .and_then(Value::as_i64)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| bad("has no valid index"))?;
        let values = map
            .get("values")
            .and_then(Value::as_list)
            .ok_or_else(|| bad("has no values"))?
            .iter()
            .map(|v| v.as_f64().ok_or_else(|| bad("has a non-numeric value")))
            .collect::<AnalysisResult<Vec<_>>>()?;
        Ok(Peak::new(name, index, values))
    }
}

pub fn peaks_to_value(peaks: &[Peak]) -> Value {
    Value::List(peaks.iter().map(Peak::to_value).collect())
}

pub fn peaks_from_value(value: &Value) -> AnalysisResult<Vec<Peak>> {
    value
        .as_list()
        .ok_or_else(|| AnalysisError::InvalidInput {
            what: format!("expected a list of peaks, got {}", value.type_name()),
        })?
        .iter()
        .map(Peak::from_value)
        .collect()
}

/// Result of `noise`.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseEstimate {
    /// `true` marks points stripped as outliers.
    pub mask: Vec<bool>,
    pub mean: Real,
    pub std: Real,
    pub converged: bool,
}

/// Estimate the noise level by iteratively stripping the most extreme point.
///
/// Stops when the relative change in standard deviation drops below
/// `stable`, or once `max_cut` (a fraction) of the points are gone.
pub fn noise(
    data: &[Real],
    cut_side: Side,
    stable: Real,
    max_cut: Real,
) -> AnalysisResult<NoiseEstimate> {
    if data.is_empty() {
        return Err(AnalysisError::InvalidInput {
            what: "cannot estimate noise of an empty signal".to_string(),
        });
    }
    let n = data.len();
    let mut mask = vec![false; n];
    let mut m = mean(data);
    let mut s = std_dev(data);
    if s == 0.0 {
        return Ok(NoiseEstimate {
            mask,
            mean: m,
            std: s,
            converged: true,
        });
    }

    let max_cuts = ((n as Real * max_cut) as usize).min(n - 1);
    let mut converged = false;
    let mut kept: Vec<Real> = Vec::with_capacity(n);
    for cut in 0..max_cuts {
        let worst = data
            .iter()
            .enumerate()
            .filter(|(i, _)| !mask[*i])
            .map(|(i, v)| (i, cut_side.deviation(*v, m)))
            .fold(None, |best: Option<(usize, Real)>, (i, d)| match best {
                Some((_, bd)) if bd >= d => best,
                _ => Some((i, d)),
            });
        let Some((i, _)) = worst else { break };
        mask[i] = true;

        kept.clear();
        kept.extend(data.iter().zip(&mask).filter(|(_, m)| !**m).map(|(v, _)| *v));
        let new_mean = mean(&kept);
        let new_std = std_dev(&kept);
        let relative_change = (new_std - s).abs() / s;
        m = new_mean;
        s = new_std;
        if s == 0.0 || relative_change < stable {
            debug!(cuts = cut + 1, mean = m, std = s, "noise estimate converged");
            converged = true;
            break;
        }
    }

    Ok(NoiseEstimate {
        mask,
        mean: m,
        std: s,
        converged,
    })
}

/// Mark points deviating from `mean` by more than `min_deviations * std`.
pub fn above_noise(
    data: &[Real],
    side: Side,
    min_deviations: Real,
    mean: Real,
    std: Real,
) -> Vec<bool> {
    let threshold = min_deviations * std;
    data.iter()
        .map(|v| side.deviation(*v, mean) > threshold)
        .collect()
}

/// Contiguous runs of `true` become peaks.
pub fn mask_to_peaks(data: &[Real], mask: &[bool]) -> Vec<Peak> {
    let mut peaks = Vec::new();
    let mut start: Option<usize> = None;
    let n = data.len().min(mask.len());
    for i in 0..=n {
        let inside = i < n && mask[i];
        match (inside, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                let name = format!("peak {}", peaks.len());
                peaks.push(Peak::new(name, s, data[s..i].to_vec()));
                start = None;
            }
            _ => {}
        }
    }
    peaks
}

/// Coalesce peaks separated by fewer than `see_double` points, including the
/// samples between them.
pub fn merge_double_peaks(data: &[Real], peaks: &[Peak], see_double: usize) -> Vec<Peak> {
    let mut merged: Vec<Peak> = Vec::with_capacity(peaks.len());
    for peak in peaks {
        if let Some(last) = merged.last_mut() {
            let gap = peak.index.saturating_sub(last.post_index());
            if gap < see_double {
                let end = peak.post_index().max(last.post_index()).min(data.len());
                last.values = data[last.index.min(end)..end].to_vec();
                continue;
            }
        }
        merged.push(peak.clone());
    }
    merged
}

/// Discard peaks with fewer than `min_points` samples.
pub fn drop_narrow_peaks(peaks: Vec<Peak>, min_points: usize) -> Vec<Peak> {
    peaks.into_iter().filter(|p| p.len() >= min_points).collect()
}

/// Knobs for the full detection pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakSettings {
    pub cut_side: Side,
    pub stable: Real,
    pub max_cut: Real,
    pub peak_sides: Side,
    pub min_deviations: Real,
    pub see_double: usize,
    pub min_points: usize,
}

impl Default for PeakSettings {
    fn default() -> Self {
        Self {
            cut_side: Side::Both,
            stable: 0.005,
            max_cut: 0.2,
            peak_sides: Side::Both,
            min_deviations: 5.0,
            see_double: 10,
            min_points: 1,
        }
    }
}

pub fn find_peaks(data: &[Real], settings: &PeakSettings) -> AnalysisResult<Vec<Peak>> {
    let est = noise(data, settings.cut_side, settings.stable, settings.max_cut)?;
    let mask = above_noise(
        data,
        settings.peak_sides,
        settings.min_deviations,
        est.mean,
        est.std,
    );
    let peaks = mask_to_peaks(data, &mask);
    let peaks = merge_double_peaks(data, &peaks, settings.see_double);
    let peaks = drop_narrow_peaks(peaks, settings.min_points);
    debug!(
        count = peaks.len(),
        mean = est.mean,
        std = est.std,
        converged = est.converged,
        "peak detection finished"
    );
    Ok(peaks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_data_converges_immediately() {
        let data = vec![3.0; 50];
        let est = noise(&data, Side::Both, 0.005, 0.2).unwrap();
        assert!(est.converged);
        assert_eq!(est.mean, 3.0);
        assert_eq!(est.std, 0.0);
        assert!(est.mask.iter().all(|m| !m));
    }

    #[test]
    fn noise_strips_outlier() {
        let mut data: Vec<Real> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        data[40] = 100.0;
        let est = noise(&data, Side::Both, 0.005, 0.2).unwrap();
        assert!(est.mask[40]);
        assert!(est.std < 1.5);
    }

    #[test]
    fn empty_signal_is_rejected() {
        assert!(noise(&[], Side::Both, 0.005, 0.2).is_err());
    }

    #[test]
    fn above_noise_respects_side() {
        let data = [0.0, 10.0, -10.0, 0.5];
        assert_eq!(
            above_noise(&data, Side::Both, 5.0, 0.0, 1.0),
            vec![false, true, true, false]
        );
        assert_eq!(
            above_noise(&data, Side::Positive, 5.0, 0.0, 1.0),
            vec![false, true, false, false]
        );
        assert_eq!(
            above_noise(&data, Side::Negative, 5.0, 0.0, 1.0),
            vec![false, false, true, false]
        );
    }

    #[test]
    fn mask_runs_become_peaks() {
        let data = [0.0, 1.0, 2.0, 0.0, 0.0, 5.0];
        let mask = [false, true, true, false, false, true];
        let peaks = mask_to_peaks(&data, &mask);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].index, 1);
        assert_eq!(peaks[0].values, vec![1.0, 2.0]);
        assert_eq!(peaks[0].post_index(), 3);
        assert_eq!(peaks[1].index, 5);
        assert_eq!(peaks[1].name, "peak 1");
    }

    #[test]
    fn close_peaks_merge_with_gap_samples() {
        let data: Vec<Real> = (0..30).map(|i| i as Real).collect();
        let peaks = vec![
            Peak::new("a", 2, data[2..4].to_vec()),
            Peak::new("b", 6, data[6..8].to_vec()),
            Peak::new("c", 25, data[25..27].to_vec()),
        ];
        let merged = merge_double_peaks(&data, &peaks, 10);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].index, 2);
        assert_eq!(merged[0].values, data[2..8].to_vec());
        assert_eq!(merged[1].name, "c");
    }

    #[test]
    fn find_peaks_picks_spike() {
        let mut data: Vec<Real> = (0..200)
            .map(|i| 1e-3 * ((i * 7919 % 13) as Real - 6.0))
            .collect();
        for v in &mut data[120..124] {
            *v = 1.0;
        }
        let peaks = find_peaks(&data, &PeakSettings::default()).unwrap();
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 120);
        assert_eq!(peaks[0].len(), 4);
    }

    #[test]
    fn peak_value_round_trip() {
        let peak = Peak::new("polymer peak 0", 12, vec![1.0, 2.5]);
        let back = Peak::from_value(&peak.to_value()).unwrap();
        assert_eq!(back, peak);
    }
}
