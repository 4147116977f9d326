//! Family-specific feature extractors.
//!
//! Each extractor maps a motif of any length to a fixed-length vector. Scale
//! dependent quantities are normalized by the motif's own spread so motifs
//! of different lengths and levels are comparable. Every output entry is
//! finite.

use crate::algorithms::spectrum::{band_energy_ratios, power_spectrum};
use crate::algorithms::stats;

pub const SPIKE_FEATURES: [&str; 6] = [
    "max_abs_z",
    "kurtosis",
    "crest_factor",
    "max_abs_diff_ratio",
    "abs_skewness",
    "outlier_fraction",
];

pub const LEVEL_NOISE_FEATURES: [&str; 6] = [
    "mean",
    "std",
    "median",
    "iqr",
    "diff_std_ratio",
    "mean_abs_diff",
];

pub const MISSING_SEGMENT_FEATURES: [&str; 5] = [
    "longest_flat_fraction",
    "zero_fraction",
    "longest_zero_fraction",
    "max_jump_ratio",
    "jump_rate",
];

pub const SPECTRAL_FEATURES: [&str; 8] = [
    "band_0",
    "band_1",
    "band_2",
    "band_3",
    "spectral_centroid",
    "spectral_flatness",
    "spectral_entropy",
    "dominant_frequency",
];

/// Peak and tail statistics.
pub fn spike_features(motif: &[f64]) -> Vec<f64> {
    let mean = stats::mean(motif);
    let sd = stats::std_dev(motif);
    let (max_z, outliers) = if sd > f64::EPSILON {
        let z: Vec<f64> = motif.iter().map(|v| ((v - mean) / sd).abs()).collect();
        let max_z = z.iter().copied().fold(0.0, f64::max);
        let outliers = z.iter().filter(|&&v| v > 3.0).count() as f64 / motif.len() as f64;
        (max_z, outliers)
    } else {
        (0.0, 0.0)
    };
    let max_diff = stats::diff(motif).iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));

    vec![
        max_z,
        stats::kurtosis(motif),
        stats::crest_factor(motif),
        ratio(max_diff, sd),
        stats::skewness(motif).abs(),
        outliers,
    ]
}

/// Location, dispersion and roughness.
pub fn level_noise_features(motif: &[f64]) -> Vec<f64> {
    let sd = stats::std_dev(motif);
    let diffs = stats::diff(motif);
    let mean_abs_diff = stats::mean(&diffs.iter().map(|d| d.abs()).collect::<Vec<_>>());
    vec![
        stats::mean(motif),
        sd,
        stats::median(motif),
        stats::quantile(motif, 0.75) - stats::quantile(motif, 0.25),
        ratio(stats::std_dev(&diffs), sd),
        mean_abs_diff,
    ]
}

/// Flat runs, zeros and abrupt jumps.
pub fn missing_segment_features(motif: &[f64]) -> Vec<f64> {
    let n = motif.len().max(1) as f64;
    let diffs = stats::diff(motif);

    // A flat run of k equal samples shows up as k - 1 zero differences.
    let longest_flat = if motif.is_empty() {
        0
    } else {
        stats::longest_run(&diffs, |d| d == 0.0) + 1
    };
    let zeros = motif.iter().filter(|&&v| v == 0.0).count();
    let longest_zero = stats::longest_run(motif, |v| v == 0.0);

    let range = motif.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        - motif.iter().copied().fold(f64::INFINITY, f64::min);
    let abs_diffs: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    let max_jump = abs_diffs.iter().copied().fold(0.0, f64::max);
    let typical = stats::median(&abs_diffs);
    let jumps = abs_diffs
        .iter()
        .filter(|&&d| d > 0.0 && d > 3.0 * typical)
        .count();

    vec![
        longest_flat as f64 / n,
        zeros as f64 / n,
        longest_zero as f64 / n,
        if range.is_finite() { ratio(max_jump, range) } else { 0.0 },
        jumps as f64 / n,
    ]
}

/// Band energy ratios and spectral shape.
pub fn spectral_features(motif: &[f64]) -> Vec<f64> {
    let power = power_spectrum(motif);
    let mut out = band_energy_ratios(&power, 4);

    let total: f64 = power.iter().sum();
    if power.is_empty() || total <= f64::EPSILON {
        out.extend([0.0; 4]);
        return out;
    }
    let bins = power.len() as f64;

    let centroid = power
        .iter()
        .enumerate()
        .map(|(i, p)| (i + 1) as f64 * p)
        .sum::<f64>()
        / total
        / bins;

    let floor = total * 1e-12 / bins;
    let log_mean = power.iter().map(|p| (p + floor).ln()).sum::<f64>() / bins;
    let flatness = (log_mean.exp() / (total / bins)).min(1.0);

    let entropy = if power.len() > 1 {
        -power
            .iter()
            .map(|p| p / total)
            .filter(|&q| q > 0.0)
            .map(|q| q * q.ln())
            .sum::<f64>()
            / bins.ln()
    } else {
        0.0
    };

    let dominant = power
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| (i + 1) as f64 / bins)
        .unwrap_or(0.0);

    out.extend([centroid, flatness, entropy, dominant]);
    out
}

/// `num / den`, or 0.0 when the denominator vanishes.
fn ratio(num: f64, den: f64) -> f64 {
    if den.abs() <= f64::EPSILON {
        0.0
    } else {
        num / den
    }
}
