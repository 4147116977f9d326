use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use motifguard_core::config::StorageConfig;
use motifguard_core::{Config, Motif, Series};
use motifguard_compute::TrainingRunner;
use motifguard_store::ArtifactStore;

/// Create a unique temp directory for each test.
pub fn test_data_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("motifguard-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Default config rooted at `data_dir`, with a small forest to keep tests fast.
pub fn make_config(data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage = StorageConfig::new(data_dir);
    config.worker.threads = 2;
    config.classifier.n_trees = 10;
    config.classifier.max_depth = 6;
    config
}

pub fn make_runner(config: &Config) -> TrainingRunner {
    let store = ArtifactStore::open(&config.storage).unwrap();
    TrainingRunner::new(config.clone(), store)
}

/// Unit sinusoid that cycles through three periods in blocks of `block`
/// samples. The phase is carried across blocks so there are no jumps.
pub fn three_state_sinusoid(sensor: &str, len: usize, block: usize) -> Series {
    let periods = [12.0, 40.0, 120.0];
    let mut phase = 0.0_f64;
    let values = (0..len)
        .map(|i| {
            let v = phase.sin();
            phase += 2.0 * PI / periods[(i / block) % 3];
            v
        })
        .collect();
    Series::new(sensor, values)
}

/// Three level regimes (0, 5, 10) with small oscillation, in blocks.
pub fn level_regimes(sensor: &str, len: usize, block: usize) -> Series {
    let values = (0..len)
        .map(|i| {
            let k = (i / block) % 3;
            5.0 * k as f64 + 0.5 * (2.0 * PI * i as f64 / 25.0).sin()
        })
        .collect();
    Series::new(sensor, values)
}

/// `count` clean sinusoidal motifs of `len` samples at varied levels.
pub fn sinusoid_motifs(count: usize, len: usize) -> Vec<Motif> {
    (0..count)
        .map(|m| {
            let level = (m % 5) as f64;
            let phase = m as f64 * 0.37;
            let values = (0..len)
                .map(|i| level + (2.0 * PI * i as f64 / 20.0 + phase).sin())
                .collect();
            Motif::new(m * len, m % 3, values)
        })
        .collect()
}

/// Raw bytes of every persisted artifact under `data_dir`, keyed by path
/// relative to it. Run reports are left out; they are rewritten per run.
pub fn artifact_bytes(data_dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(data_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.path().starts_with(data_dir.join("Reports")))
        .map(|e| {
            let rel = e.path().strip_prefix(data_dir).unwrap().to_path_buf();
            (rel, std::fs::read(e.path()).unwrap())
        })
        .collect()
}
