use tracing::info;

use motifguard_core::Config;
use motifguard_store::ArtifactStore;

/// Runs the training pipeline over a set of sensors on a worker pool.
pub struct TrainingRunner {
    pub(super) config: Config,
    pub(super) store: ArtifactStore,
}

impl TrainingRunner {
    pub fn new(config: Config, store: ArtifactStore) -> Self {
        info!(
            threads = config.worker.resolved_threads(),
            run_id = store.run_id(),
            "Training runner ready"
        );
        Self { config, store }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Hand the store back, e.g. to open model bundles after a run.
    pub fn into_store(self) -> ArtifactStore {
        self.store
    }
}
