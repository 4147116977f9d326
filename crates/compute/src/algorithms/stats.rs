//! Descriptive statistics over sample slices.
//!
//! All functions are total: empty input yields 0.0 rather than NaN, and
//! moment ratios return 0.0 when the variance vanishes.

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Population variance.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Linear-interpolated quantile, `q` in [0, 1].
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Third standardized moment.
pub fn skewness(values: &[f64]) -> f64 {
    standardized_moment(values, 3)
}

/// Fourth standardized moment: E[(x - mean)^4] / std^4.
///
/// A Gaussian signal has kurtosis of about 3.
pub fn kurtosis(values: &[f64]) -> f64 {
    standardized_moment(values, 4)
}

fn standardized_moment(values: &[f64], order: i32) -> f64 {
    let var = variance(values);
    if var <= f64::EPSILON {
        return 0.0;
    }
    let m = mean(values);
    let sd = var.sqrt();
    values.iter().map(|v| ((v - m) / sd).powi(order)).sum::<f64>() / values.len() as f64
}

/// Root mean square.
pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// Peak-to-RMS ratio of the mean-removed signal.
pub fn crest_factor(values: &[f64]) -> f64 {
    let m = mean(values);
    let centered: Vec<f64> = values.iter().map(|v| v - m).collect();
    let r = rms(&centered);
    if r <= f64::EPSILON {
        return 0.0;
    }
    let peak = centered.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    peak / r
}

/// First differences `x[i+1] - x[i]`.
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Length of the longest run of consecutive samples satisfying `pred`.
pub fn longest_run(values: &[f64], pred: impl Fn(f64) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for &v in values {
        if pred(v) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}
