use hk_analysis::polymer::{PegParams, fjc_fn, fjc_peg_fn, wlc_fn};
use hk_analysis::{PolymerModel, PolymerSettings, fit_polymer};
use hk_core::linspace;

const T: f64 = 300.0;

fn extension() -> Vec<f64> {
    linspace(10e-9, 30e-9, 20)
}

fn rel(a: f64, b: f64) -> f64 {
    ((a - b) / b).abs()
}

fn settings(model: PolymerModel) -> PolymerSettings {
    PolymerSettings {
        model,
        temperature: T,
        ..PolymerSettings::default()
    }
}

#[test]
fn wlc_free_fit_recovers_both_lengths() {
    let x = extension();
    let f: Vec<f64> = x.iter().map(|x| wlc_fn(*x, T, 35e-9, 2.5e-10)).collect();
    let s = PolymerSettings {
        wlc_persistence_length: None,
        ..settings(PolymerModel::Wlc)
    };
    let fit = fit_polymer(&x, &f, &s).unwrap();
    assert!(rel(fit.length, 35e-9) < 1e-3, "L = {}", fit.length);
    assert!(rel(fit.segment_length, 2.5e-10) < 1e-3, "p = {}", fit.segment_length);
    assert!(fit.report.converged);
}

#[test]
fn wlc_fixed_persistence_length_settles_on_best_contour_length() {
    let x = extension();
    let f: Vec<f64> = x.iter().map(|x| wlc_fn(*x, T, 35e-9, 2.5e-10)).collect();
    let s = PolymerSettings {
        wlc_persistence_length: Some(5e-10),
        ..settings(PolymerModel::Wlc)
    };
    let fit = fit_polymer(&x, &f, &s).unwrap();
    assert!(rel(fit.length, 3.318e-8) < 1e-3, "L = {}", fit.length);
    assert_eq!(fit.segment_length, 5e-10);

    let tension = fit.tension(&x).unwrap();
    assert_eq!(tension.len(), x.len());
    assert!(tension.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn fjc_fits() {
    let x = extension();
    let f: Vec<f64> = x
        .iter()
        .map(|x| fjc_fn(*x, T, 35e-9, 2.5e-10).unwrap())
        .collect();

    let free = PolymerSettings {
        fjc_kuhn_length: None,
        ..settings(PolymerModel::Fjc)
    };
    let fit = fit_polymer(&x, &f, &free).unwrap();
    assert!(rel(fit.length, 35e-9) < 1e-3);
    assert!(rel(fit.segment_length, 2.5e-10) < 1e-3);

    let fixed = PolymerSettings {
        fjc_kuhn_length: Some(5e-10),
        ..settings(PolymerModel::Fjc)
    };
    let fit = fit_polymer(&x, &f, &fixed).unwrap();
    assert!(rel(fit.length, 3.1999e-8) < 1e-3, "L = {}", fit.length);
}

#[test]
fn fjc_peg_free_fit_recovers_segments_and_kuhn_length() {
    let x = extension();
    let truth = PegParams {
        temperature: T,
        segments: 123.0,
        kuhn_length: 7e-10,
        ..PegParams::default()
    };
    let f: Vec<f64> = x.iter().map(|x| fjc_peg_fn(*x, &truth).unwrap()).collect();
    let s = PolymerSettings {
        peg_kuhn_length: None,
        ..settings(PolymerModel::FjcPeg)
    };
    let fit = fit_polymer(&x, &f, &s).unwrap();
    assert!(rel(fit.length, 123.0) < 1e-3, "N = {}", fit.length);
    assert!(rel(fit.segment_length, 7e-10) < 1e-3, "a = {}", fit.segment_length);

    let info = fit.to_info();
    assert_eq!(info["model"].as_str(), Some("FJC-PEG"));
    assert!(info.contains_key("segments"));
}

#[test]
fn fit_without_positive_extension_is_poor() {
    let x = vec![-3e-9, -2e-9, -1e-9];
    let f = vec![1e-12, 2e-12, 3e-12];
    let err = fit_polymer(&x, &f, &settings(PolymerModel::Wlc)).unwrap_err();
    assert!(err.is_poor_fit());
}

#[test]
fn model_failures_inside_a_fit_are_poor_fits() {
    let mut x = extension();
    let f: Vec<f64> = x.iter().map(|x| wlc_fn(*x, T, 35e-9, 4e-10)).collect();
    x[5] = f64::NAN;
    for model in [PolymerModel::Wlc, PolymerModel::Fjc, PolymerModel::FjcPeg] {
        let err = fit_polymer(&x, &f, &settings(model)).unwrap_err();
        assert!(err.is_poor_fit(), "{model}: {err:?}");
    }
}
