//! Per-family binary classifiers.
//!
//! [`AnomalyClassifier`] is the contract the dataset builder, the training
//! runner and the handler rely on. [`ForestClassifier`] is the shipped
//! implementation; it serializes with its fitted model so it can be stored
//! as an artifact and reloaded for inference.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use motifguard_core::config::ClassifierConfig;
use motifguard_core::AnomalyFamily;

use crate::algorithms::forest::{ForestError, ForestParams, RandomForest};

use super::registry;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier has not been fitted")]
    NotFitted,
    #[error("feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("invalid training set: {0}")]
    InvalidTrainingSet(String),
    #[error("fit deadline reached before any model was built")]
    Timeout,
}

impl From<ForestError> for ClassifierError {
    fn from(e: ForestError) -> Self {
        match e {
            ForestError::NoTrees => ClassifierError::Timeout,
            ForestError::RaggedRow { expected, actual, .. } => {
                ClassifierError::DimensionMismatch { expected, actual }
            }
            other => ClassifierError::InvalidTrainingSet(other.to_string()),
        }
    }
}

/// A supervised binary model over one family's feature vectors.
///
/// Label 1 is the synthetic anomaly, 0 the normal motif.
pub trait AnomalyClassifier: Send + Sync {
    fn family(&self) -> AnomalyFamily;

    /// Train on `(x, y)`. Calling again replaces the previous model.
    fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<(), ClassifierError>;

    /// Positive-class probability per row.
    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ClassifierError>;

    /// Width of the fitted feature space, `None` before `fit`.
    fn n_features(&self) -> Option<usize>;

    /// Probability at or above which a row is labeled anomalous.
    fn threshold(&self) -> f64 {
        0.5
    }

    /// Hard 0/1 label per row.
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>, ClassifierError> {
        let threshold = self.threshold();
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| u8::from(p >= threshold))
            .collect())
    }
}

/// Forest hyperparameters for one family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestSettings {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub max_features: Option<usize>,
    pub decision_threshold: f64,
    pub fit_timeout_secs: u64,
}

impl ForestSettings {
    /// Global classifier settings with the family's registry overrides applied.
    pub fn for_family(config: &ClassifierConfig, family: AnomalyFamily) -> Self {
        let profile = registry::spec(family).classifier;
        Self {
            n_trees: config.n_trees,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            max_features: profile.max_features,
            decision_threshold: profile.decision_threshold,
            fit_timeout_secs: config.fit_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestClassifier {
    family: AnomalyFamily,
    settings: ForestSettings,
    seed: u64,
    model: Option<RandomForest>,
}

impl ForestClassifier {
    pub fn new(family: AnomalyFamily, settings: ForestSettings, seed: u64) -> Self {
        Self {
            family,
            settings,
            seed,
            model: None,
        }
    }

    pub fn for_family(family: AnomalyFamily, config: &ClassifierConfig, seed: u64) -> Self {
        Self::new(family, ForestSettings::for_family(config, family), seed)
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    pub fn n_trees(&self) -> usize {
        self.model.as_ref().map_or(0, RandomForest::n_trees)
    }

    pub fn settings(&self) -> &ForestSettings {
        &self.settings
    }
}

impl AnomalyClassifier for ForestClassifier {
    fn family(&self) -> AnomalyFamily {
        self.family
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<(), ClassifierError> {
        if let Some(bad) = y.iter().find(|&&label| label > 1) {
            return Err(ClassifierError::InvalidTrainingSet(format!(
                "label {} is not 0 or 1",
                bad
            )));
        }
        let params = ForestParams {
            n_trees: self.settings.n_trees,
            max_depth: self.settings.max_depth,
            min_samples_split: self.settings.min_samples_split,
            max_features: self.settings.max_features,
            deadline: Some(Instant::now() + Duration::from_secs(self.settings.fit_timeout_secs)),
        };
        // Reseed on every fit so retraining on the same data is reproducible.
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.model = Some(RandomForest::fit(x, y, &params, &mut rng)?);
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::NotFitted)?;
        let expected = model.n_features();
        x.iter()
            .map(|row| {
                if row.len() != expected {
                    return Err(ClassifierError::DimensionMismatch {
                        expected,
                        actual: row.len(),
                    });
                }
                Ok(model.predict_proba_row(row))
            })
            .collect()
    }

    fn n_features(&self) -> Option<usize> {
        self.model.as_ref().map(RandomForest::n_features)
    }

    fn threshold(&self) -> f64 {
        self.settings.decision_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ForestSettings {
        ForestSettings::for_family(&ClassifierConfig::default(), AnomalyFamily::Spike)
    }

    fn separable() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..50 {
            let jitter = (i % 7) as f64 * 0.01;
            x.push(vec![1.0 + jitter, 0.5]);
            y.push(0);
            x.push(vec![4.0 + jitter, 0.5]);
            y.push(1);
        }
        (x, y)
    }

    #[test]
    fn unfitted_classifier_refuses_to_predict() {
        let clf = ForestClassifier::new(AnomalyFamily::Spike, settings(), 1);
        assert_eq!(clf.n_features(), None);
        assert_eq!(clf.predict(&[vec![1.0, 2.0]]).unwrap_err(), ClassifierError::NotFitted);
    }

    #[test]
    fn fit_then_predict() {
        let (x, y) = separable();
        let mut clf = ForestClassifier::new(AnomalyFamily::Spike, settings(), 1);
        clf.fit(&x, &y).unwrap();
        assert_eq!(clf.n_features(), Some(2));
        assert_eq!(clf.predict(&x).unwrap(), y);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let (x, y) = separable();
        let mut clf = ForestClassifier::new(AnomalyFamily::Spike, settings(), 1);
        clf.fit(&x, &y).unwrap();
        assert_eq!(
            clf.predict_proba(&[vec![1.0, 2.0, 3.0]]).unwrap_err(),
            ClassifierError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn refit_replaces_the_model() {
        let (x, y) = separable();
        let mut clf = ForestClassifier::new(AnomalyFamily::Spike, settings(), 1);
        clf.fit(&x, &y).unwrap();
        let wide: Vec<Vec<f64>> = x.iter().map(|r| vec![r[0], r[1], 0.0]).collect();
        clf.fit(&wide, &y).unwrap();
        assert_eq!(clf.n_features(), Some(3));
    }

    #[test]
    fn non_binary_labels_are_rejected() {
        let mut clf = ForestClassifier::new(AnomalyFamily::Spike, settings(), 1);
        let result = clf.fit(&[vec![1.0], vec![2.0]], &[0, 2]);
        assert!(matches!(result, Err(ClassifierError::InvalidTrainingSet(_))));
    }

    #[test]
    fn survives_a_serialization_round_trip() {
        let (x, y) = separable();
        let mut clf = ForestClassifier::new(AnomalyFamily::Spike, settings(), 1);
        clf.fit(&x, &y).unwrap();
        let json = serde_json::to_string(&clf).unwrap();
        let back: ForestClassifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back.predict_proba(&x).unwrap(), clf.predict_proba(&x).unwrap());
    }
}
