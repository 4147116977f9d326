//! The per-family strategy table.
//!
//! Each [`AnomalyFamily`] maps to one (transform, feature extractor,
//! classifier profile) entry. Adding a family means adding a row here.

use rand::rngs::StdRng;

use motifguard_core::AnomalyFamily;

use super::features;
use super::generators;

/// Synthetic anomaly transform: `(motif, alpha, rng) -> corrupted motif`.
pub type TransformFn = fn(&[f64], f64, &mut StdRng) -> Vec<f64>;

/// Feature extractor: `motif -> fixed-length vector`.
pub type ExtractFn = fn(&[f64]) -> Vec<f64>;

/// Family-specific classifier overrides on top of the global settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierProfile {
    /// Features tried per split; `None` for `ceil(sqrt(d))`.
    pub max_features: Option<usize>,
    /// Probability at or above which a motif is flagged.
    pub decision_threshold: f64,
}

#[derive(Clone, Copy)]
pub struct FamilySpec {
    pub family: AnomalyFamily,
    pub transform: TransformFn,
    pub extract: ExtractFn,
    pub feature_names: &'static [&'static str],
    pub classifier: ClassifierProfile,
}

impl FamilySpec {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}

pub static REGISTRY: [FamilySpec; 4] = [
    FamilySpec {
        family: AnomalyFamily::Spike,
        transform: generators::spike,
        extract: features::spike_features,
        feature_names: &features::SPIKE_FEATURES,
        classifier: ClassifierProfile {
            max_features: None,
            decision_threshold: 0.5,
        },
    },
    FamilySpec {
        family: AnomalyFamily::LevelNoise,
        transform: generators::level_noise,
        extract: features::level_noise_features,
        feature_names: &features::LEVEL_NOISE_FEATURES,
        classifier: ClassifierProfile {
            max_features: None,
            decision_threshold: 0.5,
        },
    },
    FamilySpec {
        family: AnomalyFamily::PartialMissingSegment,
        transform: generators::missing_segment,
        extract: features::missing_segment_features,
        feature_names: &features::MISSING_SEGMENT_FEATURES,
        // Few, strongly informative features: consider all at every split.
        classifier: ClassifierProfile {
            max_features: Some(features::MISSING_SEGMENT_FEATURES.len()),
            decision_threshold: 0.5,
        },
    },
    FamilySpec {
        family: AnomalyFamily::PowerSpectralDistortion,
        transform: generators::spectral_distortion,
        extract: features::spectral_features,
        feature_names: &features::SPECTRAL_FEATURES,
        classifier: ClassifierProfile {
            max_features: Some(4),
            decision_threshold: 0.5,
        },
    },
];

/// The registry entry for `family`.
pub fn spec(family: AnomalyFamily) -> &'static FamilySpec {
    match family {
        AnomalyFamily::Spike => &REGISTRY[0],
        AnomalyFamily::LevelNoise => &REGISTRY[1],
        AnomalyFamily::PartialMissingSegment => &REGISTRY[2],
        AnomalyFamily::PowerSpectralDistortion => &REGISTRY[3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_family_has_its_own_row() {
        for family in AnomalyFamily::ALL {
            assert_eq!(spec(family).family, family);
        }
    }

    #[test]
    fn extractor_width_matches_names() {
        let motif: Vec<f64> = (0..64).map(|i| (i as f64 * 0.3).sin()).collect();
        for row in &REGISTRY {
            assert_eq!((row.extract)(&motif).len(), row.n_features(), "{}", row.family);
        }
    }
}
