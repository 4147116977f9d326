use std::collections::BTreeSet;
use std::f64::consts::PI;

use motifguard_core::config::SegmentationConfig;
use motifguard_core::Series;
use motifguard_compute::{ExclusionReason, SegmentOutcome, Segmenter};

use crate::helpers::{level_regimes, make_config, make_runner, test_data_dir};

#[test]
fn test_constant_series_lands_in_excluded_report() {
    let data_dir = test_data_dir();
    let config = make_config(&data_dir);

    let report = make_runner(&config)
        .run(vec![Series::new("LIT_101", vec![812.5; 1000])], Vec::new())
        .unwrap();

    assert_eq!(report.sensors_total, 1);
    assert_eq!(report.sensors_segmented, 0);
    assert!(report.trained.is_empty());
    assert_eq!(report.excluded_sensors(), vec!["LIT_101"]);
    assert!(matches!(report.exclusions[0].reason, ExclusionReason::NoMotifs { .. }));

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_three_state_sinusoid_has_a_motif_per_state() {
    let segmenter = Segmenter::new(SegmentationConfig::default(), 42);
    let values: Vec<f64> = (0..5000).map(|i| (2.0 * PI * i as f64 / 100.0).sin()).collect();
    let series = Series::new("FIT_101", values);

    let SegmentOutcome::Segmented(segmentation) = segmenter.segment(&series).unwrap() else {
        panic!("sinusoid should segment");
    };

    let states: BTreeSet<usize> = segmentation.motifs.iter().map(|m| m.state).collect();
    assert_eq!(states, BTreeSet::from([0, 1, 2]));
    assert_eq!(segmentation.states.len(), 5000);
    assert!(segmentation.motifs.iter().all(|m| m.len() > 10));
}

#[test]
fn test_level_regimes_have_a_motif_per_state() {
    let segmenter = Segmenter::new(SegmentationConfig::default(), 42);
    let series = level_regimes("LIT_101", 5000, 250);

    let SegmentOutcome::Segmented(segmentation) = segmenter.segment(&series).unwrap() else {
        panic!("three-regime series should segment");
    };

    let states: BTreeSet<usize> = segmentation.motifs.iter().map(|m| m.state).collect();
    assert_eq!(states, BTreeSet::from([0, 1, 2]));
}

#[test]
fn test_motifs_are_contiguous_slices_of_the_series() {
    let segmenter = Segmenter::new(SegmentationConfig::default(), 7);
    let series = level_regimes("FIT_101", 3000, 200);

    let SegmentOutcome::Segmented(segmentation) = segmenter.segment(&series).unwrap() else {
        panic!("three-regime series should segment");
    };

    let mut last_end = 0;
    for motif in &segmentation.motifs {
        assert!(motif.start >= last_end, "motifs must not overlap");
        assert_eq!(motif.values, series.values[motif.start..motif.end()]);
        assert!(segmentation.states[motif.start..motif.end()]
            .iter()
            .all(|&s| s == motif.state));
        last_end = motif.end();
    }
}

#[test]
fn test_min_motif_len_is_honoured_for_any_setting() {
    let series = level_regimes("FIT_101", 2000, 120);
    for min_motif_len in [10, 40, 100] {
        let config = SegmentationConfig {
            min_motif_len,
            ..SegmentationConfig::default()
        };
        if let SegmentOutcome::Segmented(s) = Segmenter::new(config, 42).segment(&series).unwrap() {
            assert!(s.motifs.iter().all(|m| m.len() > min_motif_len));
        }
    }
}

#[test]
fn test_short_series_is_excluded() {
    let segmenter = Segmenter::new(SegmentationConfig::default(), 42);
    let outcome = segmenter
        .segment(&Series::new("P_101", vec![1.0, 2.0, 3.0, 2.0, 1.0]))
        .unwrap();
    assert!(matches!(
        outcome,
        SegmentOutcome::Excluded {
            reason: ExclusionReason::NoMotifs { .. },
            ..
        }
    ));
}

#[test]
fn test_empty_series_is_a_precondition_error() {
    let segmenter = Segmenter::new(SegmentationConfig::default(), 42);
    assert!(segmenter.segment(&Series::new("P_101", Vec::new())).is_err());
}
