//! Synthetic anomaly transforms.
//!
//! Every transform takes a normal motif, an intensity `alpha` and a seeded
//! generator, and returns a corrupted copy of the same length. The input is
//! never modified and `alpha == 0` returns the motif unchanged (PSD within
//! FFT round-off).

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use realfft::num_complex::Complex;

use crate::algorithms::spectrum::{irfft, rfft};
use crate::algorithms::stats;

/// Scale of a motif's normal variation. Falls back to a fraction of its
/// level (at least 0.1) when the motif is flat, so flat motifs can still
/// be corrupted.
pub fn spread(motif: &[f64]) -> f64 {
    let sd = stats::std_dev(motif);
    if sd > 1e-9 {
        sd
    } else {
        0.1 * stats::mean(motif).abs().max(1.0)
    }
}

/// Displace `max(1, len / 50)` random samples away from the motif mean by
/// `alpha * spread`.
pub fn spike(motif: &[f64], alpha: f64, rng: &mut StdRng) -> Vec<f64> {
    let mut out = motif.to_vec();
    if alpha == 0.0 || out.is_empty() {
        return out;
    }
    let magnitude = alpha * spread(motif);
    let mean = stats::mean(motif);
    let count = (out.len() / 50).max(1).min(out.len());

    let mut positions = sample(rng, out.len(), count).into_vec();
    positions.sort_unstable();
    for p in positions {
        let sign = if out[p] > mean {
            1.0
        } else if out[p] < mean {
            -1.0
        } else if rng.gen_bool(0.5) {
            1.0
        } else {
            -1.0
        };
        out[p] += sign * magnitude;
    }
    out
}

/// Shift the whole motif by `alpha * spread / 2` (random sign) and add
/// Gaussian noise with sigma `alpha * spread / 4`.
pub fn level_noise(motif: &[f64], alpha: f64, rng: &mut StdRng) -> Vec<f64> {
    let mut out = motif.to_vec();
    if alpha == 0.0 || out.is_empty() {
        return out;
    }
    let s = spread(motif);
    let shift = if rng.gen_bool(0.5) { 0.5 } else { -0.5 } * alpha * s;

    match Normal::new(0.0, (alpha * s * 0.25).abs()) {
        Ok(noise) => {
            for v in out.iter_mut() {
                *v += shift + noise.sample(rng);
            }
        }
        Err(_) => {
            for v in out.iter_mut() {
                *v += shift;
            }
        }
    }
    out
}

/// Zero a contiguous window of `round(alpha * len)` samples. `alpha` is a
/// fraction; the window never covers the whole motif.
pub fn missing_segment(motif: &[f64], alpha: f64, rng: &mut StdRng) -> Vec<f64> {
    let mut out = motif.to_vec();
    let len = out.len();
    if len < 2 {
        return out;
    }
    let width = ((alpha.clamp(0.0, 1.0) * len as f64).round() as usize).min(len - 1);
    if width == 0 {
        return out;
    }
    let start = rng.gen_range(0..=len - width);
    for v in &mut out[start..start + width] {
        *v = 0.0;
    }
    out
}

/// Add energy to a random band covering one eighth of the positive
/// spectrum. Each bin in the band gains `alpha * mean_bin_magnitude` at a
/// random phase. DC and Nyquist are left alone.
pub fn spectral_distortion(motif: &[f64], alpha: f64, rng: &mut StdRng) -> Vec<f64> {
    let len = motif.len();
    if alpha == 0.0 || len < 4 {
        return motif.to_vec();
    }
    let Ok((n, mut spectrum)) = rfft(motif) else {
        return motif.to_vec();
    };
    let half = n / 2;

    let mean_magnitude = spectrum[1..half].iter().map(|c| c.norm()).sum::<f64>() / (half - 1) as f64;
    let base = mean_magnitude.max(spread(motif) * (n as f64).sqrt());
    let magnitude = alpha * base;

    let width = (half / 8).max(1);
    let first = rng.gen_range(1..=half - width);
    for bin in &mut spectrum[first..first + width] {
        let phase = rng.gen_range(0.0..2.0 * PI);
        *bin += Complex::from_polar(magnitude, phase);
    }

    irfft(spectrum, n, len).unwrap_or_else(|_| motif.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn motif() -> Vec<f64> {
        (0..120)
            .map(|i| 5.0 + (i as f64 * 0.21).sin() + 0.3 * (i as f64 * 0.05).cos())
            .collect()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(17)
    }

    #[test]
    fn zero_alpha_is_a_no_op() {
        let m = motif();
        assert_eq!(spike(&m, 0.0, &mut rng()), m);
        assert_eq!(level_noise(&m, 0.0, &mut rng()), m);
        assert_eq!(missing_segment(&m, 0.0, &mut rng()), m);
        let psd = spectral_distortion(&m, 0.0, &mut rng());
        for (a, b) in m.iter().zip(&psd) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn lengths_are_preserved() {
        let m = motif();
        assert_eq!(spike(&m, 3.0, &mut rng()).len(), m.len());
        assert_eq!(level_noise(&m, 1.0, &mut rng()).len(), m.len());
        assert_eq!(missing_segment(&m, 0.3, &mut rng()).len(), m.len());
        assert_eq!(spectral_distortion(&m, 2.0, &mut rng()).len(), m.len());
    }

    #[test]
    fn spike_moves_len_over_50_samples() {
        let m = motif();
        let out = spike(&m, 3.0, &mut rng());
        let changed = m.iter().zip(&out).filter(|(a, b)| a != b).count();
        assert_eq!(changed, 2);
        let s = spread(&m);
        for (a, b) in m.iter().zip(&out) {
            if a != b {
                assert!(((a - b).abs() - 3.0 * s).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn missing_segment_zeroes_a_contiguous_window() {
        let m = motif();
        let out = missing_segment(&m, 0.25, &mut rng());
        let zeros: Vec<usize> = (0..out.len()).filter(|&i| out[i] == 0.0).collect();
        assert_eq!(zeros.len(), 30);
        assert_eq!(zeros[29] - zeros[0], 29);
    }

    #[test]
    fn level_noise_shifts_the_mean() {
        let m = motif();
        let out = level_noise(&m, 2.0, &mut rng());
        let shift = (stats::mean(&out) - stats::mean(&m)).abs();
        assert!(shift > 0.5 * spread(&m));
    }

    #[test]
    fn psd_changes_the_signal() {
        let m = motif();
        let out = spectral_distortion(&m, 2.0, &mut rng());
        let diff: f64 = m.iter().zip(&out).map(|(a, b)| (a - b).abs()).sum();
        assert!(diff > 1.0);
    }

    #[test]
    fn same_seed_same_output() {
        let m = motif();
        assert_eq!(spike(&m, 3.0, &mut rng()), spike(&m, 3.0, &mut rng()));
        assert_eq!(level_noise(&m, 1.0, &mut rng()), level_noise(&m, 1.0, &mut rng()));
        assert_eq!(
            spectral_distortion(&m, 2.0, &mut rng()),
            spectral_distortion(&m, 2.0, &mut rng())
        );
    }

    #[test]
    fn input_is_untouched() {
        let m = motif();
        let copy = m.clone();
        let _ = missing_segment(&m, 0.5, &mut rng());
        let _ = spike(&m, 3.0, &mut rng());
        assert_eq!(m, copy);
    }
}
