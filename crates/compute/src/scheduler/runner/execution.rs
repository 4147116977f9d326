use std::collections::BTreeSet;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{info, warn};

use motifguard_core::Series;

use crate::pipeline::metrics::{PipelineMetrics, Stage};
use crate::pipeline::report::{Exclusion, RunReport, TrainingEntry};
use crate::pipeline::segmenter::Segmentation;
use crate::pipeline::{FamilyOutcome, FamilyStage, SensorPipeline, SensorStage, SensorState};
use crate::scheduler::task::RunError;
use crate::scheduler::types::training_jobs;

use super::TrainingRunner;

/// Name of the report file under the reports directory.
pub const REPORT_NAME: &str = "training_report";

impl TrainingRunner {
    /// Segment every series, then train every (sensor, family) classifier.
    ///
    /// `pre_exclusions` are sensors dropped upstream (e.g. by
    /// preprocessing); they are carried into the report unchanged. Sensors
    /// or families that cannot be modelled are excluded, not errors: the run
    /// only fails on worker pool or storage failures.
    pub fn run(
        &self,
        mut series: Vec<Series>,
        pre_exclusions: Vec<Exclusion>,
    ) -> Result<RunReport, RunError> {
        let started_at = Utc::now();
        let threads = self.config.worker.resolved_threads();

        series.sort_by(|a, b| a.sensor.cmp(&b.sensor));
        let before = series.len();
        series.dedup_by(|a, b| a.sensor == b.sensor);
        if series.len() != before {
            warn!(duplicates = before - series.len(), "Duplicate sensor columns ignored");
        }

        info!(
            sensors = series.len(),
            pre_excluded = pre_exclusions.len(),
            threads,
            "Starting training run"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| RunError::ThreadPool(e.to_string()))?;
        let pipeline = SensorPipeline::new(&self.config, &self.store);

        // Phase 1: segmentation, one job per sensor.
        let sensor_stages: Vec<SensorStage> = pool.install(|| {
            series
                .par_iter()
                .map(|s| pipeline.segment(s))
                .collect::<Result<Vec<_>, _>>()
        })?;

        let segmented: Vec<&Segmentation> = sensor_stages
            .iter()
            .filter_map(|stage| match &stage.state {
                SensorState::Ready(segmentation) => Some(segmentation),
                SensorState::Excluded(_) => None,
            })
            .collect();
        info!(
            segmented = segmented.len(),
            excluded = sensor_stages.len() - segmented.len(),
            "Segmentation phase complete"
        );

        // Phase 2: synthesis and training, one job per (sensor, family).
        let jobs = training_jobs(&segmented);
        let mut family_stages: Vec<FamilyStage> = pool.install(|| {
            jobs.par_iter()
                .map(|job| pipeline.train_family(job.segmentation, job.family))
                .collect::<Result<Vec<_>, _>>()
        })?;
        family_stages.sort_by(|a, b| a.sensor.cmp(&b.sensor).then(a.family.cmp(&b.family)));

        let report = self.assemble(started_at, pre_exclusions, &sensor_stages, family_stages);
        self.store.write_report(REPORT_NAME, &report)?;

        info!(
            trained = report.trained.len(),
            exclusions = report.exclusions.len(),
            fully_resumed = report.metrics.fully_resumed(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Training run complete"
        );
        Ok(report)
    }

    fn assemble(
        &self,
        started_at: chrono::DateTime<Utc>,
        pre_exclusions: Vec<Exclusion>,
        sensor_stages: &[SensorStage],
        family_stages: Vec<FamilyStage>,
    ) -> RunReport {
        let mut metrics = PipelineMetrics::default();
        let mut exclusions = pre_exclusions;
        let mut trained: Vec<TrainingEntry> = Vec::new();
        let mut sensors_segmented = 0;

        for stage in sensor_stages {
            if let Some(timing) = stage.timing {
                metrics.record(Stage::Segmentation, timing.resumed, timing.elapsed);
            }
            match &stage.state {
                SensorState::Ready(_) => sensors_segmented += 1,
                SensorState::Excluded(exclusion) => exclusions.push(exclusion.clone()),
            }
        }

        for stage in family_stages {
            if let Some(timing) = stage.dataset {
                metrics.record(Stage::Dataset, timing.resumed, timing.elapsed);
            }
            if let Some(timing) = stage.training {
                metrics.record(Stage::Training, timing.resumed, timing.elapsed);
            }
            match stage.outcome {
                FamilyOutcome::Trained(entry) => trained.push(entry),
                FamilyOutcome::Excluded(exclusion) => exclusions.push(exclusion),
            }
        }

        exclusions.sort_by(|a, b| a.sensor.cmp(&b.sensor).then(a.family.cmp(&b.family)));
        for exclusion in &exclusions {
            metrics.record_exclusion();
            match exclusion.family {
                Some(family) => warn!(
                    sensor = %exclusion.sensor,
                    family = %family,
                    reason = %exclusion.reason,
                    "Family excluded"
                ),
                None => warn!(sensor = %exclusion.sensor, reason = %exclusion.reason, "Sensor excluded"),
            }
        }

        let sensors_total = sensor_stages
            .iter()
            .map(|s| s.sensor.as_str())
            .chain(exclusions.iter().map(|e| e.sensor.as_str()))
            .collect::<BTreeSet<_>>()
            .len();

        RunReport {
            run_id: self.store.run_id().to_string(),
            started_at,
            finished_at: Utc::now(),
            sensors_total,
            sensors_segmented,
            trained,
            exclusions,
            metrics,
        }
    }
}
