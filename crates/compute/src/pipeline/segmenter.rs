//! Motif segmentation.
//!
//! A sensor series is turned into a 2-D observation per sample (trailing
//! window mean and standard deviation, scaled by the series' global
//! standard deviation), a Gaussian HMM with `n_states` states is fitted to
//! those observations, and the Viterbi path is cut into runs of equal
//! state. Runs no longer than `min_motif_len` are dropped.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use motifguard_core::config::SegmentationConfig;
use motifguard_core::{GuardError, Motif, Series};

use crate::algorithms::hmm::{FitOptions, FitSummary, GaussianHmm, HmmError};

use super::report::ExclusionReason;
use super::seed::rng_for;

/// Lower bound on per-state variance in scaled observation units.
const VARIANCE_FLOOR: f64 = 1e-4;

/// Relative standard deviation below which a series counts as constant.
const FLAT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("rejected input: {0}")]
    InvalidSeries(#[from] GuardError),
}

/// Fit statistics kept alongside the motifs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentDiagnostics {
    /// Model fits attempted (1 + retries used).
    pub attempts: u32,
    pub log_likelihood: Option<f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Samples decoded into each state.
    pub state_counts: Vec<usize>,
    /// Runs dropped for being too short.
    pub dropped_runs: usize,
    pub dropped_samples: usize,
}

/// Motifs, the decoded state path and diagnostics for one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    pub sensor: String,
    pub motifs: Vec<Motif>,
    pub states: Vec<usize>,
    pub diagnostics: SegmentDiagnostics,
}

/// Result of segmenting one sensor.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutcome {
    /// At least one motif survived filtering.
    Segmented(Segmentation),
    /// The sensor takes no further part in the run.
    Excluded {
        reason: ExclusionReason,
        diagnostics: SegmentDiagnostics,
    },
}

pub struct Segmenter {
    config: SegmentationConfig,
    seed: u64,
}

impl Segmenter {
    pub fn new(config: SegmentationConfig, seed: u64) -> Self {
        Self { config, seed }
    }

    /// Segment a validated series into motifs.
    ///
    /// Empty or non-finite input is rejected with an error. Everything
    /// else yields an outcome: a constant series or one whose runs are all
    /// too short is excluded, as is one whose model fails on every attempt
    /// or runs out of time.
    pub fn segment(&self, series: &Series) -> Result<SegmentOutcome, SegmentError> {
        series.validate()?;
        let cfg = &self.config;
        let values = &series.values;

        let Some(observations) = observations(values, cfg.window_size) else {
            return Ok(SegmentOutcome::Excluded {
                reason: ExclusionReason::NoMotifs {
                    detail: "series has no variance".to_string(),
                },
                diagnostics: SegmentDiagnostics::default(),
            });
        };
        if values.len() <= cfg.min_motif_len || values.len() < cfg.n_states {
            return Ok(SegmentOutcome::Excluded {
                reason: ExclusionReason::NoMotifs {
                    detail: format!("series of {} samples is too short", values.len()),
                },
                diagnostics: SegmentDiagnostics::default(),
            });
        }

        let deadline = Instant::now() + Duration::from_secs(cfg.fit_timeout_secs);
        let options = FitOptions {
            max_iterations: cfg.max_iterations,
            tolerance: cfg.tolerance,
            variance_floor: VARIANCE_FLOOR,
            deadline: Some(deadline),
        };

        let mut diagnostics = SegmentDiagnostics::default();
        let mut best: Option<(GaussianHmm, FitSummary)> = None;
        let mut last_error = String::new();

        for attempt in 0..=cfg.max_retries {
            diagnostics.attempts = attempt + 1;
            // Each attempt draws its own initialisation.
            let mut rng = rng_for(self.seed, &[&series.sensor, "segment", &attempt.to_string()]);

            let fitted = GaussianHmm::init_from_kmeans(&observations, cfg.n_states, VARIANCE_FLOOR, &mut rng)
                .and_then(|mut hmm| hmm.fit(&observations, &options).map(|s| (hmm, s)));

            match fitted {
                Ok((hmm, summary)) => {
                    let better = best
                        .as_ref()
                        .map_or(true, |(_, b)| summary.log_likelihood > b.log_likelihood);
                    let converged = summary.converged;
                    if better {
                        best = Some((hmm, summary));
                    }
                    if converged {
                        break;
                    }
                    debug!(sensor = %series.sensor, attempt, "HMM did not converge, retrying");
                }
                Err(HmmError::DeadlineExceeded { iterations }) => {
                    warn!(sensor = %series.sensor, attempt, iterations, "Segmentation timed out");
                    return Ok(SegmentOutcome::Excluded {
                        reason: ExclusionReason::Timeout {
                            stage: "segmentation".to_string(),
                        },
                        diagnostics,
                    });
                }
                Err(e) => {
                    warn!(sensor = %series.sensor, attempt, error = %e, "HMM fit failed, retrying");
                    last_error = e.to_string();
                }
            }
        }

        let Some((hmm, summary)) = best else {
            return Ok(SegmentOutcome::Excluded {
                reason: ExclusionReason::SegmentationFailed {
                    attempts: diagnostics.attempts,
                    detail: last_error,
                },
                diagnostics,
            });
        };

        diagnostics.log_likelihood = Some(summary.log_likelihood);
        diagnostics.iterations = summary.iterations;
        diagnostics.converged = summary.converged;

        let states = canonical_states(&hmm, hmm.viterbi(&observations));
        let mut counts = vec![0usize; cfg.n_states];
        for &s in &states {
            counts[s] += 1;
        }
        diagnostics.state_counts = counts;

        let grouped = group_motifs(values, &states, cfg.min_motif_len);
        diagnostics.dropped_runs = grouped.dropped_runs;
        diagnostics.dropped_samples = grouped.dropped_samples;

        debug!(
            sensor = %series.sensor,
            motifs = grouped.motifs.len(),
            dropped_runs = grouped.dropped_runs,
            log_likelihood = summary.log_likelihood,
            iterations = summary.iterations,
            "Segmentation complete"
        );

        if grouped.motifs.is_empty() {
            return Ok(SegmentOutcome::Excluded {
                reason: ExclusionReason::NoMotifs {
                    detail: format!("all {} runs were too short", grouped.dropped_runs),
                },
                diagnostics,
            });
        }

        Ok(SegmentOutcome::Segmented(Segmentation {
            sensor: series.sensor.clone(),
            motifs: grouped.motifs,
            states,
            diagnostics,
        }))
    }
}

/// Trailing-window (mean, std) per sample, scaled by the global std.
///
/// `None` when the series has no variance.
pub fn observations(values: &[f64], window: usize) -> Option<Vec<Vec<f64>>> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let global_mean = values.iter().sum::<f64>() / n as f64;
    let global_var = values.iter().map(|v| (v - global_mean).powi(2)).sum::<f64>() / n as f64;
    let global_std = global_var.sqrt();
    if global_std <= FLAT_TOLERANCE * global_mean.abs().max(1.0) {
        return None;
    }

    // Prefix sums of centered values keep the window stats O(1) per sample.
    let window = window.max(1);
    let mut sum = vec![0.0; n + 1];
    let mut sum_sq = vec![0.0; n + 1];
    for (i, v) in values.iter().enumerate() {
        let c = v - global_mean;
        sum[i + 1] = sum[i] + c;
        sum_sq[i + 1] = sum_sq[i] + c * c;
    }

    let obs = (0..n)
        .map(|t| {
            let lo = (t + 1).saturating_sub(window);
            let len = (t + 1 - lo) as f64;
            let m = (sum[t + 1] - sum[lo]) / len;
            let var = ((sum_sq[t + 1] - sum_sq[lo]) / len - m * m).max(0.0);
            vec![m / global_std, var.sqrt() / global_std]
        })
        .collect();
    Some(obs)
}

/// Relabel states in ascending order of their mean observation so that
/// identical fits always yield identical labels.
fn canonical_states(hmm: &GaussianHmm, path: Vec<usize>) -> Vec<usize> {
    let means = hmm.means();
    let mut order: Vec<usize> = (0..hmm.n_states()).collect();
    order.sort_by(|&a, &b| {
        means[a]
            .iter()
            .zip(&means[b])
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    let mut relabel = vec![0usize; order.len()];
    for (new, &old) in order.iter().enumerate() {
        relabel[old] = new;
    }
    path.into_iter().map(|s| relabel[s]).collect()
}

pub struct GroupedMotifs {
    pub motifs: Vec<Motif>,
    pub dropped_runs: usize,
    pub dropped_samples: usize,
}

/// Cut `values` into maximal runs of equal state; keep runs longer than
/// `min_len`.
pub fn group_motifs(values: &[f64], states: &[usize], min_len: usize) -> GroupedMotifs {
    let mut out = GroupedMotifs {
        motifs: Vec::new(),
        dropped_runs: 0,
        dropped_samples: 0,
    };
    let n = values.len().min(states.len());
    let mut start = 0;
    while start < n {
        let state = states[start];
        let mut end = start + 1;
        while end < n && states[end] == state {
            end += 1;
        }
        let len = end - start;
        if len > min_len {
            out.motifs.push(Motif::new(start, state, values[start..end].to_vec()));
        } else {
            out.dropped_runs += 1;
            out.dropped_samples += len;
        }
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SegmentationConfig {
        SegmentationConfig::default()
    }

    #[test]
    fn group_drops_short_runs() {
        let values: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let mut states = vec![0; 15];
        states.extend(vec![1; 5]);
        states.extend(vec![0; 20]);

        let grouped = group_motifs(&values, &states, 10);
        assert_eq!(grouped.motifs.len(), 2);
        assert_eq!(grouped.dropped_runs, 1);
        assert_eq!(grouped.dropped_samples, 5);
        assert_eq!(grouped.motifs[0].start, 0);
        assert_eq!(grouped.motifs[0].len(), 15);
        assert_eq!(grouped.motifs[1].start, 20);
        assert_eq!(grouped.motifs[1].values[0], 20.0);
    }

    #[test]
    fn run_of_exactly_min_len_is_dropped() {
        let values = vec![1.0; 10];
        let grouped = group_motifs(&values, &[0; 10], 10);
        assert!(grouped.motifs.is_empty());
    }

    #[test]
    fn observations_of_constant_series_are_none() {
        assert!(observations(&[4.2; 100], 10).is_none());
    }

    #[test]
    fn observations_scale_by_global_std() {
        let values: Vec<f64> = (0..50).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let obs = observations(&values, 2).unwrap();
        assert_eq!(obs.len(), 50);
        // Two-sample windows of +1/-1 have mean 0 and std 1 (global std 1).
        assert!(obs[10][0].abs() < 1e-12);
        assert!((obs[10][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_series_is_rejected() {
        let seg = Segmenter::new(config(), 42);
        let result = seg.segment(&Series::new("s", Vec::new()));
        assert!(matches!(result, Err(SegmentError::InvalidSeries(_))));
    }

    #[test]
    fn constant_series_is_excluded() {
        let seg = Segmenter::new(config(), 42);
        let outcome = seg.segment(&Series::new("flat", vec![3.0; 1000])).unwrap();
        assert!(matches!(
            outcome,
            SegmentOutcome::Excluded {
                reason: ExclusionReason::NoMotifs { .. },
                ..
            }
        ));
    }

    #[test]
    fn step_series_yields_motifs_over_min_len() {
        let values: Vec<f64> = (0..600)
            .map(|i| if (i / 100) % 2 == 0 { 0.0 } else { 10.0 } + 0.01 * ((i * 7) % 13) as f64)
            .collect();
        let seg = Segmenter::new(
            SegmentationConfig {
                n_states: 2,
                ..config()
            },
            7,
        );
        let SegmentOutcome::Segmented(result) = seg.segment(&Series::new("step", values)).unwrap() else {
            panic!("expected motifs");
        };
        assert!(result.motifs.len() >= 2);
        assert!(result.motifs.iter().all(|m| m.len() > 10));
        assert_eq!(result.states.len(), 600);
        // Motifs are ordered and non-overlapping.
        for pair in result.motifs.windows(2) {
            assert!(pair[0].end() <= pair[1].start);
        }
    }
}
