//! Exclusion records, training metrics and the run report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use motifguard_core::{AnomalyFamily, SensorId};

use super::metrics::PipelineMetrics;

/// Why a sensor (or one of its families) has no anomaly coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Dropped before segmentation (missing data).
    Preprocessing { detail: String },
    /// Malformed input series (empty, non-finite).
    InvalidSeries { detail: String },
    /// Segmentation produced no motif above the minimum length.
    NoMotifs { detail: String },
    /// The state model failed on every attempt.
    SegmentationFailed { attempts: u32, detail: String },
    /// A fit ran past its time budget.
    Timeout { stage: String },
    /// Not enough usable motifs to build a balanced dataset.
    TooFewMotifs { found: usize, required: usize },
    TrainingFailed { detail: String },
}

impl ExclusionReason {
    /// Outcomes that will repeat on unchanged input and are safe to persist.
    pub fn is_deterministic(&self) -> bool {
        matches!(
            self,
            ExclusionReason::NoMotifs { .. } | ExclusionReason::SegmentationFailed { .. }
        )
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::Preprocessing { detail } => write!(f, "preprocessing: {}", detail),
            ExclusionReason::InvalidSeries { detail } => write!(f, "invalid series: {}", detail),
            ExclusionReason::NoMotifs { detail } => write!(f, "no motifs: {}", detail),
            ExclusionReason::SegmentationFailed { attempts, detail } => {
                write!(f, "segmentation failed after {} attempts: {}", attempts, detail)
            }
            ExclusionReason::Timeout { stage } => write!(f, "{} timed out", stage),
            ExclusionReason::TooFewMotifs { found, required } => {
                write!(f, "{} usable motifs, need {}", found, required)
            }
            ExclusionReason::TrainingFailed { detail } => write!(f, "training failed: {}", detail),
        }
    }
}

/// A sensor, or a single (sensor, family), left out of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub sensor: SensorId,
    /// `None` excludes the whole sensor.
    pub family: Option<AnomalyFamily>,
    pub reason: ExclusionReason,
}

impl Exclusion {
    pub fn sensor(sensor: impl Into<SensorId>, reason: ExclusionReason) -> Self {
        Self {
            sensor: sensor.into(),
            family: None,
            reason,
        }
    }

    pub fn family(sensor: impl Into<SensorId>, family: AnomalyFamily, reason: ExclusionReason) -> Self {
        Self {
            sensor: sensor.into(),
            family: Some(family),
            reason,
        }
    }
}

/// Binary classification quality on a labeled set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub examples: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    /// Area under the ROC curve from the scores; 0.5 when only one class is present.
    pub auc: f64,
}

impl ClassificationMetrics {
    /// Compute metrics from true labels, predicted labels and anomaly scores.
    ///
    /// Precision and recall are 0.0 when undefined (no predicted or no true positives).
    pub fn compute(y_true: &[u8], y_pred: &[u8], scores: &[f64]) -> Self {
        let n = y_true.len().min(y_pred.len());
        if n == 0 {
            return Self::default();
        }

        let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (1, 1) => tp += 1,
                (0, 1) => fp += 1,
                (0, 0) => tn += 1,
                _ => fn_ += 1,
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        Self {
            examples: n,
            accuracy: ratio(tp + tn, n),
            precision: ratio(tp, tp + fp),
            recall: ratio(tp, tp + fn_),
            auc: roc_auc(&y_true[..n], &scores[..n.min(scores.len())]),
        }
    }
}

impl fmt::Display for ClassificationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} accuracy={:.3} precision={:.3} recall={:.3} auc={:.3}",
            self.examples, self.accuracy, self.precision, self.recall, self.auc
        )
    }
}

/// ROC AUC via the rank-sum (Mann-Whitney U) statistic, averaging tied ranks.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> f64 {
    let n = y_true.len().min(scores.len());
    let positives = y_true[..n].iter().filter(|&&y| y == 1).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = (0..n).filter(|&k| y_true[k] == 1).map(|k| ranks[k]).sum();
    let u = pos_rank_sum - (positives * (positives + 1)) as f64 / 2.0;
    u / (positives * negatives) as f64
}

/// One trained (sensor, family) classifier in the run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingEntry {
    pub sensor: SensorId,
    pub family: AnomalyFamily,
    pub metrics: ClassificationMetrics,
    /// True when the classifier came from a previous run.
    pub resumed: bool,
}

/// Everything a training run produced, ordered by (sensor, family).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sensors_total: usize,
    pub sensors_segmented: usize,
    pub trained: Vec<TrainingEntry>,
    pub exclusions: Vec<Exclusion>,
    pub metrics: PipelineMetrics,
}

impl RunReport {
    /// Sensors excluded as a whole, in report order.
    pub fn excluded_sensors(&self) -> Vec<&str> {
        self.exclusions
            .iter()
            .filter(|e| e.family.is_none())
            .map(|e| e.sensor.as_str())
            .collect()
    }

    pub fn is_excluded(&self, sensor: &str) -> bool {
        self.exclusions
            .iter()
            .any(|e| e.family.is_none() && e.sensor == sensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_classifier() {
        let y = [0, 1, 0, 1];
        let m = ClassificationMetrics::compute(&y, &y, &[0.1, 0.9, 0.2, 0.8]);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.auc, 1.0);
    }

    #[test]
    fn undefined_precision_is_zero() {
        let m = ClassificationMetrics::compute(&[1, 1], &[0, 0], &[0.1, 0.2]);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.accuracy, 0.0);
    }

    #[test]
    fn auc_handles_ties_and_single_class() {
        assert!((roc_auc(&[0, 1], &[0.5, 0.5]) - 0.5).abs() < 1e-12);
        assert_eq!(roc_auc(&[1, 1, 1], &[0.1, 0.2, 0.3]), 0.5);
        assert!((roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn only_sensor_level_exclusions_count_as_excluded() {
        let report = RunReport {
            run_id: "r".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            sensors_total: 2,
            sensors_segmented: 1,
            trained: Vec::new(),
            exclusions: vec![
                Exclusion::sensor("flat", ExclusionReason::NoMotifs { detail: "x".into() }),
                Exclusion::family(
                    "busy",
                    AnomalyFamily::Spike,
                    ExclusionReason::TooFewMotifs { found: 1, required: 2 },
                ),
            ],
            metrics: PipelineMetrics::default(),
        };
        assert_eq!(report.excluded_sensors(), vec!["flat"]);
        assert!(report.is_excluded("flat"));
        assert!(!report.is_excluded("busy"));
    }

    #[test]
    fn reason_serializes_with_kind_tag() {
        let json = serde_json::to_string(&ExclusionReason::Timeout { stage: "segmentation".into() }).unwrap();
        assert!(json.contains("\"kind\":\"timeout\""));
    }
}
