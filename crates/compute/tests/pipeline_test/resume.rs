use motifguard_core::{AnomalyFamily, Series};
use motifguard_compute::{LabeledDataset, Segmentation};
use motifguard_store::{ArtifactKey, ArtifactStore};

use crate::helpers::{artifact_bytes, level_regimes, make_config, make_runner, test_data_dir};

fn input() -> Vec<Series> {
    vec![
        level_regimes("FIT_101", 1800, 200),
        level_regimes("LIT_101", 2400, 150),
        Series::new("AIT_201", vec![7.25; 1000]),
    ]
}

#[test]
fn test_rerun_leaves_every_artifact_untouched() {
    let data_dir = test_data_dir();
    let config = make_config(&data_dir);

    let first = make_runner(&config).run(input(), Vec::new()).unwrap();
    assert_eq!(first.trained.len(), 8);
    let before = artifact_bytes(&data_dir);
    assert!(!before.is_empty());

    let second = make_runner(&config).run(input(), Vec::new()).unwrap();
    let after = artifact_bytes(&data_dir);

    assert_eq!(before, after);
    assert!(second.metrics.fully_resumed());
    assert_eq!(second.metrics.segmentation_resumed, 3);
    assert_eq!(second.metrics.classifiers_resumed, 8);
    assert_eq!(second.excluded_sensors(), first.excluded_sensors());

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_interrupted_run_resumes_from_last_completed_job() {
    let data_dir = test_data_dir();
    let config = make_config(&data_dir);

    make_runner(&config).run(input(), Vec::new()).unwrap();

    // Simulate a run killed before LIT_101/PSD was trained.
    let store = ArtifactStore::open(&config.storage).unwrap();
    let missing = ArtifactKey::classifier("LIT_101", AnomalyFamily::PowerSpectralDistortion);
    std::fs::remove_file(store.path_of(&missing)).unwrap();

    let report = make_runner(&config).run(input(), Vec::new()).unwrap();
    assert_eq!(report.metrics.segmented, 0);
    assert_eq!(report.metrics.classifiers_trained, 1);
    assert_eq!(report.metrics.classifiers_resumed, 7);
    // The dataset survived, only the model was refitted.
    assert_eq!(report.metrics.datasets_resumed, 1);
    assert_eq!(report.metrics.datasets_built, 0);
    assert!(store.exists(&missing));

    std::fs::remove_dir_all(&data_dir).ok();
}

#[test]
fn test_same_seed_gives_identical_motifs_and_datasets() {
    let dir_a = test_data_dir();
    let dir_b = test_data_dir();
    let config_a = make_config(&dir_a);
    let config_b = make_config(&dir_b);

    make_runner(&config_a).run(input(), Vec::new()).unwrap();
    make_runner(&config_b).run(input(), Vec::new()).unwrap();

    let store_a = ArtifactStore::open(&config_a.storage).unwrap();
    let store_b = ArtifactStore::open(&config_b.storage).unwrap();

    for sensor in ["FIT_101", "LIT_101"] {
        let key = ArtifactKey::motifs(sensor);
        let a: Segmentation = store_a.read(&key).unwrap();
        let b: Segmentation = store_b.read(&key).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            std::fs::read(store_a.path_of(&key)).unwrap(),
            std::fs::read(store_b.path_of(&key)).unwrap()
        );

        for family in AnomalyFamily::ALL {
            let key = ArtifactKey::dataset(sensor, family);
            let a: LabeledDataset = store_a.read(&key).unwrap();
            let b: LabeledDataset = store_b.read(&key).unwrap();
            assert_eq!(a, b, "{}/{} datasets differ", sensor, family);
        }
    }

    std::fs::remove_dir_all(&dir_a).ok();
    std::fs::remove_dir_all(&dir_b).ok();
}

#[test]
fn test_different_seed_changes_datasets() {
    let dir_a = test_data_dir();
    let dir_b = test_data_dir();
    let config_a = make_config(&dir_a);
    let mut config_b = make_config(&dir_b);
    config_b.synthesis.seed = 7;

    make_runner(&config_a).run(input(), Vec::new()).unwrap();
    make_runner(&config_b).run(input(), Vec::new()).unwrap();

    let key = ArtifactKey::dataset("FIT_101", AnomalyFamily::Spike);
    let a: LabeledDataset = ArtifactStore::open(&config_a.storage).unwrap().read(&key).unwrap();
    let b: LabeledDataset = ArtifactStore::open(&config_b.storage).unwrap().read(&key).unwrap();
    assert_ne!(a.features, b.features);

    std::fs::remove_dir_all(&dir_a).ok();
    std::fs::remove_dir_all(&dir_b).ok();
}
