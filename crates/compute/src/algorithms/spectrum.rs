//! Real-signal FFT helpers and spectral summaries.
//!
//! Transforms are planned with `realfft`; inputs of arbitrary length are
//! zero-padded to the next power of two. Spectra are one-sided: `n / 2 + 1`
//! bins from DC to Nyquist.

use realfft::num_complex::Complex;
use realfft::{FftError, RealFftPlanner};

/// Smallest power of two >= `n` (1 for n = 0).
pub fn next_pow2(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Forward transform of a real signal, zero-padded to a power of two.
///
/// Returns the padded length alongside the half spectrum.
pub fn rfft(values: &[f64]) -> Result<(usize, Vec<Complex<f64>>), FftError> {
    let n = next_pow2(values.len());
    let mut planner = RealFftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);

    let mut input = forward.make_input_vec();
    input[..values.len()].copy_from_slice(values);
    let mut spectrum = forward.make_output_vec();
    forward.process(&mut input, &mut spectrum)?;
    Ok((n, spectrum))
}

/// Inverse of [`rfft`] for a padded length `n`, returning the first `len`
/// samples. Includes the 1/n normalization.
pub fn irfft(mut spectrum: Vec<Complex<f64>>, n: usize, len: usize) -> Result<Vec<f64>, FftError> {
    let mut planner = RealFftPlanner::<f64>::new();
    let inverse = planner.plan_fft_inverse(n);

    // DC and Nyquist must be real for a real output.
    if let Some(first) = spectrum.first_mut() {
        first.im = 0.0;
    }
    if n % 2 == 0 {
        if let Some(last) = spectrum.last_mut() {
            last.im = 0.0;
        }
    }

    let mut output = inverse.make_output_vec();
    inverse.process(&mut spectrum, &mut output)?;
    let scale = 1.0 / n as f64;
    Ok(output.into_iter().take(len).map(|v| v * scale).collect())
}

/// One-sided power spectrum of the mean-removed signal, bins 1..=N/2.
///
/// The DC bin is dropped so a level offset carries no spectral energy.
pub fn power_spectrum(values: &[f64]) -> Vec<f64> {
    if values.len() < 2 {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let centered: Vec<f64> = values.iter().map(|v| v - mean).collect();
    match rfft(&centered) {
        Ok((_, spectrum)) => spectrum[1..].iter().map(|c| c.norm_sqr()).collect(),
        // Buffers come from the plan itself, so lengths always match.
        Err(_) => Vec::new(),
    }
}

/// Split a power spectrum into `n_bands` equal-width bands and return each
/// band's share of the total energy. All zeros for a silent spectrum.
pub fn band_energy_ratios(power: &[f64], n_bands: usize) -> Vec<f64> {
    let mut bands = vec![0.0; n_bands];
    if power.is_empty() || n_bands == 0 {
        return bands;
    }
    for (i, &p) in power.iter().enumerate() {
        let band = (i * n_bands / power.len()).min(n_bands - 1);
        bands[band] += p;
    }
    let total: f64 = bands.iter().sum();
    if total <= f64::EPSILON {
        return vec![0.0; n_bands];
    }
    for b in &mut bands {
        *b /= total;
    }
    bands
}
