//! Scoring trained bundles against a labeled table.
//!
//! Each sensor column is cut into sliding windows that are evaluated through
//! the [`AnomalyHandler`]. A row is predicted anomalous when any window
//! covering it, from any sensor, is anomalous. Its score is the highest
//! confidence among those windows.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use motifguard_core::{SensorId, Series};

use super::handler::{AnomalyHandler, SensorModelBundle};
use super::report::ClassificationMetrics;

/// Per-sensor window counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvaluation {
    pub sensor: SensorId,
    pub windows: usize,
    pub flagged: usize,
    /// Windows the handler rejected (e.g. too short).
    pub rejected: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub policy: String,
    pub rows: usize,
    pub window: usize,
    pub stride: usize,
    pub sensors: Vec<SensorEvaluation>,
    /// Columns with no trained classifier.
    pub skipped: Vec<SensorId>,
    pub rows_flagged: usize,
    pub metrics: ClassificationMetrics,
}

/// Window start offsets covering `rows` samples; the last window is pulled
/// back to end exactly at `rows`.
pub fn window_starts(rows: usize, window: usize, stride: usize) -> Vec<usize> {
    if window == 0 || rows < window {
        return Vec::new();
    }
    let stride = stride.max(1);
    let mut starts: Vec<usize> = (0..=rows - window).step_by(stride).collect();
    let tail = rows - window;
    if starts.last() != Some(&tail) {
        starts.push(tail);
    }
    starts
}

/// Evaluate every column that has a bundle and score rows against `labels`.
pub fn evaluate_table(
    handler: &AnomalyHandler,
    bundles: &BTreeMap<SensorId, SensorModelBundle>,
    columns: &[Series],
    labels: &[u8],
    window: usize,
    stride: usize,
) -> EvaluationReport {
    let rows = labels.len();
    let starts = window_starts(rows, window, stride);

    let (usable, skipped): (Vec<&Series>, Vec<&Series>) = columns
        .iter()
        .partition(|s| bundles.get(&s.sensor).is_some_and(|b| !b.is_empty()));

    let per_sensor: Vec<(SensorEvaluation, Vec<(usize, bool, f64)>)> = usable
        .par_iter()
        .filter_map(|series| {
            let bundle = bundles.get(&series.sensor)?;
            let mut eval = SensorEvaluation {
                sensor: series.sensor.clone(),
                windows: 0,
                flagged: 0,
                rejected: 0,
            };
            let mut hits = Vec::with_capacity(starts.len());
            for &start in &starts {
                let Some(reading) = series.values.get(start..start + window) else {
                    continue;
                };
                eval.windows += 1;
                match handler.evaluate(&series.sensor, reading, bundle) {
                    Ok(verdict) => {
                        if verdict.anomalous {
                            eval.flagged += 1;
                        }
                        hits.push((start, verdict.anomalous, verdict.confidence));
                    }
                    Err(e) => {
                        debug!(sensor = %series.sensor, start, error = %e, "Window rejected");
                        eval.rejected += 1;
                    }
                }
            }
            Some((eval, hits))
        })
        .collect();

    let mut predicted = vec![0u8; rows];
    let mut scores = vec![0.0f64; rows];
    let mut sensors = Vec::with_capacity(per_sensor.len());
    for (eval, hits) in per_sensor {
        for (start, anomalous, confidence) in hits {
            for row in start..(start + window).min(rows) {
                if anomalous {
                    predicted[row] = 1;
                }
                scores[row] = scores[row].max(confidence);
            }
        }
        if eval.rejected > 0 {
            warn!(sensor = %eval.sensor, rejected = eval.rejected, "Some windows were rejected");
        }
        sensors.push(eval);
    }

    let metrics = ClassificationMetrics::compute(labels, &predicted, &scores);
    let rows_flagged = predicted.iter().filter(|&&p| p == 1).count();
    info!(
        rows,
        sensors = sensors.len(),
        skipped = skipped.len(),
        rows_flagged,
        %metrics,
        "Evaluation complete"
    );

    EvaluationReport {
        policy: handler.policy_name().to_string(),
        rows,
        window,
        stride,
        sensors,
        skipped: skipped.into_iter().map(|s| s.sensor.clone()).collect(),
        rows_flagged,
        metrics,
    }
}
