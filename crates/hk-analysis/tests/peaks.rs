use hk_analysis::peak::{drop_narrow_peaks, mask_to_peaks, merge_double_peaks, noise};
use hk_analysis::{Peak, Side};
use proptest::prelude::*;

fn signal_and_mask() -> impl Strategy<Value = (Vec<f64>, Vec<bool>)> {
    (1usize..200).prop_flat_map(|n| {
        (
            prop::collection::vec(-1e3f64..1e3, n),
            prop::collection::vec(any::<bool>(), n),
        )
    })
}

proptest! {
    #[test]
    fn merge_is_idempotent((data, mask) in signal_and_mask(), see_double in 0usize..30) {
        let peaks = mask_to_peaks(&data, &mask);
        let once = merge_double_peaks(&data, &peaks, see_double);
        let twice = merge_double_peaks(&data, &once, see_double);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn merged_peaks_are_far_apart((data, mask) in signal_and_mask(), see_double in 0usize..30) {
        let peaks = mask_to_peaks(&data, &mask);
        let merged = merge_double_peaks(&data, &peaks, see_double);
        for pair in merged.windows(2) {
            prop_assert!(pair[1].index - pair[0].post_index() >= see_double);
        }
    }

    #[test]
    fn narrow_peaks_are_dropped((data, mask) in signal_and_mask(), k in 0usize..20) {
        let peaks = drop_narrow_peaks(mask_to_peaks(&data, &mask), k);
        prop_assert!(peaks.iter().all(|p| p.len() >= k));
    }

    #[test]
    fn peaks_cover_exactly_the_mask((data, mask) in signal_and_mask()) {
        let peaks = mask_to_peaks(&data, &mask);
        let mut rebuilt = vec![false; data.len()];
        for p in &peaks {
            for i in p.index..p.post_index() {
                rebuilt[i] = true;
            }
            prop_assert_eq!(&p.values[..], &data[p.index..p.post_index()]);
        }
        prop_assert_eq!(rebuilt, mask);
    }

    #[test]
    fn constant_noise_converges(level in -1_000_000i32..1_000_000, n in 1usize..100) {
        let value = f64::from(level);
        let data = vec![value; n];
        let est = noise(&data, Side::Both, 0.005, 0.2).unwrap();
        prop_assert!(est.converged);
        prop_assert_eq!(est.std, 0.0);
        prop_assert_eq!(est.mean, value);
    }

    #[test]
    fn noise_never_cuts_more_than_max((data, _mask) in signal_and_mask(), max_cut in 0.0f64..0.5) {
        let est = noise(&data, Side::Both, 0.005, max_cut).unwrap();
        let cut = est.mask.iter().filter(|m| **m).count();
        prop_assert!(cut <= ((data.len() as f64 * max_cut) as usize).min(data.len() - 1));
    }
}

#[test]
fn merged_peak_spans_gap() {
    let data: Vec<f64> = (0..20).map(|i| i as f64).collect();
    let peaks = vec![
        Peak::new("a", 0, data[0..2].to_vec()),
        Peak::new("b", 5, data[5..6].to_vec()),
    ];
    let merged = merge_double_peaks(&data, &peaks, 10);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].post_index(), 6);
    assert_eq!(merged[0].values, data[0..6].to_vec());
}
