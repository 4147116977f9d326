use std::collections::BTreeMap;

use motifguard_core::{AnomalyFamily, Series};
use motifguard_compute::{evaluate_table, AnomalyHandler, SensorModelBundle, WeightedVote};
use motifguard_store::{ArtifactKey, ArtifactStore};

use crate::helpers::{level_regimes, make_config, make_runner, test_data_dir};

#[test]
fn test_stored_bundle_evaluates_all_four_families() {
    let data_dir = test_data_dir();
    let config = make_config(&data_dir);
    let series = level_regimes("FIT_101", 1800, 200);
    make_runner(&config).run(vec![series.clone()], Vec::new()).unwrap();

    let store = ArtifactStore::open(&config.storage).unwrap();
    let bundle = SensorModelBundle::load(&store, "FIT_101").unwrap();
    assert_eq!(bundle.families(), AnomalyFamily::ALL.to_vec());

    let handler = AnomalyHandler::any_family(config.segmentation.min_motif_len);
    let verdict = handler
        .evaluate("FIT_101", &series.values[20..140], &bundle)
        .unwrap();
    assert_eq!(verdict.votes.len(), 4);
    assert!(verdict.missing.is_empty());
    assert!((0.0..=1.0).contains(&verdict.confidence));
    assert_eq!(verdict.policy, "any-family");

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_missing_family_does_not_fail_evaluation() {
    let data_dir = test_data_dir();
    let config = make_config(&data_dir);
    let series = level_regimes("FIT_101", 1800, 200);
    make_runner(&config).run(vec![series.clone()], Vec::new()).unwrap();

    let store = ArtifactStore::open(&config.storage).unwrap();
    let key = ArtifactKey::classifier("FIT_101", AnomalyFamily::LevelNoise);
    std::fs::remove_file(store.path_of(&key)).unwrap();

    let bundle = SensorModelBundle::load(&store, "FIT_101").unwrap();
    assert_eq!(bundle.len(), 3);

    let handler = AnomalyHandler::new(Box::new(WeightedVote::new(0.5)), 10);
    let verdict = handler
        .evaluate("FIT_101", &series.values[400..520], &bundle)
        .unwrap();
    assert_eq!(verdict.votes.len(), 3);
    assert_eq!(verdict.missing, vec![AnomalyFamily::LevelNoise]);

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_table_evaluation_flags_injected_spikes() {
    let data_dir = test_data_dir();
    let config = make_config(&data_dir);
    let normal = level_regimes("FIT_101", 1800, 200);
    make_runner(&config).run(vec![normal.clone()], Vec::new()).unwrap();

    // Anomalous table: same process, with large spikes in the second half.
    let mut values = normal.values.clone();
    let mut labels = vec![0u8; values.len()];
    for i in (960..1800).step_by(60) {
        values[i + 30] += 25.0;
        for label in &mut labels[i..i + 60] {
            *label = 1;
        }
    }
    let columns = vec![Series::new("FIT_101", values), Series::new("NO_MODEL", vec![1.0; 1800])];

    let store = ArtifactStore::open(&config.storage).unwrap();
    let mut bundles = BTreeMap::new();
    bundles.insert("FIT_101".to_string(), SensorModelBundle::load(&store, "FIT_101").unwrap());

    let handler = AnomalyHandler::any_family(config.segmentation.min_motif_len);
    let report = evaluate_table(&handler, &bundles, &columns, &labels, 60, 60);

    assert_eq!(report.rows, 1800);
    assert_eq!(report.skipped, vec!["NO_MODEL".to_string()]);
    assert_eq!(report.sensors.len(), 1);
    assert_eq!(report.sensors[0].windows, 30);
    assert_eq!(report.metrics.examples, 1800);
    assert!(report.metrics.recall > 0.0, "no spiked window was flagged: {}", report.metrics);

    std::fs::remove_dir_all(&data_dir).ok();
}
