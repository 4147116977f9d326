//! Per-sensor training pipeline.
//!
//! Wires the segmenter, the synthetic dataset builder and the family
//! classifiers into two resumable stages:
//!
//! - **Segmentation** (one job per sensor): motifs or an exclusion marker.
//! - **Training** (one job per sensor and family): dataset, then classifier.
//!
//! Every stage looks for its persisted output first and only recomputes
//! when nothing is stored, so a killed run picks up where it stopped.

pub mod classifier;
pub mod dataset;
pub mod evaluation;
pub mod features;
pub mod fusion;
pub mod generators;
pub mod handler;
pub mod metrics;
pub mod registry;
pub mod report;
pub mod segmenter;
pub mod seed;

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use motifguard_core::config::{ClassifierConfig, SynthesisConfig};
use motifguard_core::{AnomalyFamily, Config, Series};
use motifguard_store::{ArtifactKey, ArtifactStore, StoreError, WriteOutcome};

use self::classifier::{AnomalyClassifier, ClassifierError, ForestClassifier};
use self::dataset::{DatasetBuilder, DatasetError, LabeledDataset};
use self::handler::TrainedModel;
use self::report::{ClassificationMetrics, Exclusion, ExclusionReason, TrainingEntry};
use self::segmenter::{SegmentOutcome, Segmentation, Segmenter};
use self::seed::derive_seed;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("artifact store: {0}")]
    Store(#[from] StoreError),
}

/// Whether a stage ran, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTiming {
    /// Output was already persisted; nothing was recomputed.
    pub resumed: bool,
    pub elapsed: Duration,
}

impl StageTiming {
    fn resumed() -> Self {
        Self {
            resumed: true,
            elapsed: Duration::ZERO,
        }
    }

    fn computed(started: Instant) -> Self {
        Self {
            resumed: false,
            elapsed: started.elapsed(),
        }
    }
}

/// Where a sensor stands after segmentation.
#[derive(Debug, Clone)]
pub enum SensorState {
    Ready(Segmentation),
    Excluded(Exclusion),
}

#[derive(Debug, Clone)]
pub struct SensorStage {
    pub sensor: String,
    pub state: SensorState,
    /// `None` when the series was rejected before segmentation started.
    pub timing: Option<StageTiming>,
}

#[derive(Debug, Clone)]
pub enum FamilyOutcome {
    Trained(TrainingEntry),
    Excluded(Exclusion),
}

/// Result of one (sensor, family) training job.
#[derive(Debug, Clone)]
pub struct FamilyStage {
    pub sensor: String,
    pub family: AnomalyFamily,
    pub outcome: FamilyOutcome,
    pub dataset: Option<StageTiming>,
    pub training: Option<StageTiming>,
}

impl FamilyStage {
    fn excluded(sensor: &str, family: AnomalyFamily, reason: ExclusionReason) -> Self {
        Self {
            sensor: sensor.to_string(),
            family,
            outcome: FamilyOutcome::Excluded(Exclusion::family(sensor, family, reason)),
            dataset: None,
            training: None,
        }
    }
}

/// Stage logic shared by every worker of a run.
///
/// Holds no per-sensor state: each call derives its randomness from the
/// run seed and the sensor/family it works on.
pub struct SensorPipeline<'a> {
    store: &'a ArtifactStore,
    segmenter: Segmenter,
    builder: DatasetBuilder,
    synthesis: SynthesisConfig,
    classifier: ClassifierConfig,
}

impl<'a> SensorPipeline<'a> {
    pub fn new(config: &Config, store: &'a ArtifactStore) -> Self {
        let seed = config.synthesis.seed;
        Self {
            store,
            segmenter: Segmenter::new(config.segmentation.clone(), seed),
            builder: DatasetBuilder::new(
                config.segmentation.min_motif_len,
                config.synthesis.min_training_motifs,
                seed,
            ),
            synthesis: config.synthesis.clone(),
            classifier: config.classifier.clone(),
        }
    }

    /// Segment one sensor, or reload what a previous run stored for it.
    pub fn segment(&self, series: &Series) -> Result<SensorStage, PipelineError> {
        let sensor = series.sensor.as_str();
        let marker_key = ArtifactKey::exclusion(sensor);
        let motifs_key = ArtifactKey::motifs(sensor);

        if let Some(exclusion) = self.store.read_opt::<Exclusion>(&marker_key)? {
            debug!(sensor, "Exclusion marker present, skipping segmentation");
            return Ok(SensorStage {
                sensor: sensor.to_string(),
                state: SensorState::Excluded(exclusion),
                timing: Some(StageTiming::resumed()),
            });
        }
        if let Some(segmentation) = self.store.read_opt::<Segmentation>(&motifs_key)? {
            debug!(sensor, motifs = segmentation.motifs.len(), "Motifs present, skipping segmentation");
            return Ok(SensorStage {
                sensor: sensor.to_string(),
                state: SensorState::Ready(segmentation),
                timing: Some(StageTiming::resumed()),
            });
        }

        let started = Instant::now();
        let outcome = match self.segmenter.segment(series) {
            Ok(outcome) => outcome,
            Err(e) => {
                return Ok(SensorStage {
                    sensor: sensor.to_string(),
                    state: SensorState::Excluded(Exclusion::sensor(
                        sensor,
                        ExclusionReason::InvalidSeries {
                            detail: e.to_string(),
                        },
                    )),
                    timing: None,
                });
            }
        };

        let state = match outcome {
            SegmentOutcome::Segmented(segmentation) => {
                log_write(self.store.write_once(&motifs_key, &segmentation)?, &motifs_key);
                info!(
                    sensor,
                    motifs = segmentation.motifs.len(),
                    attempts = segmentation.diagnostics.attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Sensor segmented"
                );
                SensorState::Ready(segmentation)
            }
            SegmentOutcome::Excluded { reason, .. } => {
                let exclusion = Exclusion::sensor(sensor, reason);
                if exclusion.reason.is_deterministic() {
                    log_write(self.store.write_once(&marker_key, &exclusion)?, &marker_key);
                }
                SensorState::Excluded(exclusion)
            }
        };

        Ok(SensorStage {
            sensor: sensor.to_string(),
            state,
            timing: Some(StageTiming::computed(started)),
        })
    }

    /// Build (or reload) the dataset of one family and train its classifier.
    pub fn train_family(
        &self,
        segmentation: &Segmentation,
        family: AnomalyFamily,
    ) -> Result<FamilyStage, PipelineError> {
        let sensor = segmentation.sensor.as_str();
        let model_key = ArtifactKey::classifier(sensor, family);

        if let Some(model) = self.store.read_opt::<TrainedModel>(&model_key)? {
            debug!(sensor, family = %family, "Classifier present, skipping training");
            return Ok(FamilyStage {
                sensor: sensor.to_string(),
                family,
                outcome: FamilyOutcome::Trained(TrainingEntry {
                    sensor: sensor.to_string(),
                    family,
                    metrics: model.metrics,
                    resumed: true,
                }),
                dataset: None,
                training: Some(StageTiming::resumed()),
            });
        }

        let (dataset, dataset_timing) = match self.dataset(segmentation, family)? {
            Ok(found) => found,
            Err(DatasetError::TooFewMotifs { found, required }) => {
                return Ok(FamilyStage::excluded(
                    sensor,
                    family,
                    ExclusionReason::TooFewMotifs { found, required },
                ));
            }
        };

        let started = Instant::now();
        let seed = derive_seed(self.synthesis.seed, &[sensor, family.code(), "classifier"]);
        let mut classifier = ForestClassifier::for_family(family, &self.classifier, seed);
        let metrics = match fit_and_score(&mut classifier, &dataset) {
            Ok(metrics) => metrics,
            Err(e) => {
                let reason = match e {
                    ClassifierError::Timeout => ExclusionReason::Timeout {
                        stage: "classifier fit".to_string(),
                    },
                    other => ExclusionReason::TrainingFailed {
                        detail: other.to_string(),
                    },
                };
                let mut stage = FamilyStage::excluded(sensor, family, reason);
                stage.dataset = Some(dataset_timing);
                return Ok(stage);
            }
        };

        let model = TrainedModel {
            sensor: sensor.to_string(),
            family,
            classifier,
            metrics,
        };
        log_write(self.store.write_once(&model_key, &model)?, &model_key);
        info!(
            sensor,
            family = %family,
            examples = dataset.len(),
            trees = model.classifier.n_trees(),
            metrics = %model.metrics,
            "Classifier trained"
        );

        Ok(FamilyStage {
            sensor: sensor.to_string(),
            family,
            outcome: FamilyOutcome::Trained(TrainingEntry {
                sensor: sensor.to_string(),
                family,
                metrics: model.metrics,
                resumed: false,
            }),
            dataset: Some(dataset_timing),
            training: Some(StageTiming::computed(started)),
        })
    }

    fn dataset(
        &self,
        segmentation: &Segmentation,
        family: AnomalyFamily,
    ) -> Result<Result<(LabeledDataset, StageTiming), DatasetError>, PipelineError> {
        let sensor = segmentation.sensor.as_str();
        let key = ArtifactKey::dataset(sensor, family);
        if let Some(dataset) = self.store.read_opt::<LabeledDataset>(&key)? {
            debug!(sensor, family = %family, rows = dataset.len(), "Dataset present, skipping synthesis");
            return Ok(Ok((dataset, StageTiming::resumed())));
        }

        let started = Instant::now();
        let alpha = self.synthesis.alpha_for(family);
        let dataset = match self.builder.build(sensor, &segmentation.motifs, family, alpha) {
            Ok(dataset) => dataset,
            Err(e) => return Ok(Err(e)),
        };
        log_write(self.store.write_once(&key, &dataset)?, &key);
        Ok(Ok((dataset, StageTiming::computed(started))))
    }
}

/// Fit on the dataset and score the fit on the same rows.
fn fit_and_score(
    classifier: &mut ForestClassifier,
    dataset: &LabeledDataset,
) -> Result<ClassificationMetrics, ClassifierError> {
    classifier.fit(&dataset.features, &dataset.labels)?;
    let scores = classifier.predict_proba(&dataset.features)?;
    let threshold = classifier.threshold();
    let predicted: Vec<u8> = scores.iter().map(|&p| u8::from(p >= threshold)).collect();
    Ok(ClassificationMetrics::compute(&dataset.labels, &predicted, &scores))
}

fn log_write(outcome: WriteOutcome, key: &ArtifactKey) {
    match outcome {
        WriteOutcome::Written { size_bytes } => debug!(artifact = %key, size_bytes, "Persisted"),
        WriteOutcome::AlreadyPresent => debug!(artifact = %key, "Already persisted"),
        WriteOutcome::ClaimedElsewhere => {
            warn!(artifact = %key, "Artifact claimed by another worker, not written")
        }
    }
}
