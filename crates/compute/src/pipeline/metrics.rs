use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which pipeline stage a job belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Segmentation,
    Dataset,
    Training,
}

/// Run counters, folded from per-job results after the pool drains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    // Segmentation
    /// Sensors segmented in this run.
    pub segmented: u64,
    /// Sensors whose motifs (or exclusion marker) were already persisted.
    pub segmentation_resumed: u64,
    /// Total wall time spent segmenting, in milliseconds.
    pub segmentation_ms: u64,

    // Datasets
    pub datasets_built: u64,
    pub datasets_resumed: u64,
    pub dataset_ms: u64,

    // Training
    pub classifiers_trained: u64,
    pub classifiers_resumed: u64,
    pub training_ms: u64,

    /// Exclusions of whole sensors or single families.
    pub exclusions: u64,
}

impl PipelineMetrics {
    /// Record one completed unit of stage work.
    pub fn record(&mut self, stage: Stage, resumed: bool, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        match (stage, resumed) {
            (Stage::Segmentation, false) => {
                self.segmented += 1;
                self.segmentation_ms += ms;
            }
            (Stage::Segmentation, true) => self.segmentation_resumed += 1,
            (Stage::Dataset, false) => {
                self.datasets_built += 1;
                self.dataset_ms += ms;
            }
            (Stage::Dataset, true) => self.datasets_resumed += 1,
            (Stage::Training, false) => {
                self.classifiers_trained += 1;
                self.training_ms += ms;
            }
            (Stage::Training, true) => self.classifiers_resumed += 1,
        }
    }

    pub fn record_exclusion(&mut self) {
        self.exclusions += 1;
    }

    /// True when nothing had to be recomputed.
    pub fn fully_resumed(&self) -> bool {
        self.segmented == 0 && self.datasets_built == 0 && self.classifiers_trained == 0
    }
}
