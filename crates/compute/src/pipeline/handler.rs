//! Inference: one fused verdict per sensor reading.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use motifguard_core::{AnomalyFamily, GuardError, SensorId, Series};
use motifguard_store::{ArtifactKey, ArtifactStore, StoreError};

use super::classifier::{AnomalyClassifier, ClassifierError, ForestClassifier};
use super::fusion::{AnyFamily, FamilyVote, FusionPolicy};
use super::registry;
use super::report::ClassificationMetrics;

/// Persisted classifier artifact: the fitted model plus its training scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub sensor: SensorId,
    pub family: AnomalyFamily,
    pub classifier: ForestClassifier,
    pub metrics: ClassificationMetrics,
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("reading for {sensor} has {len} samples, need more than {min}")]
    ReadingTooShort { sensor: String, len: usize, min: usize },
    #[error("invalid reading: {0}")]
    InvalidReading(#[from] GuardError),
    #[error("no trained classifier for sensor {0}")]
    NoClassifiers(String),
    #[error("reading for {sensor} scored against the bundle of {bundle}")]
    SensorMismatch { sensor: String, bundle: String },
    #[error("{family} classifier rejected the reading: {source}")]
    Classifier {
        family: AnomalyFamily,
        #[source]
        source: ClassifierError,
    },
}

/// The trained classifiers of one sensor, keyed by family.
///
/// Feature extractors come from the family registry, so the bundle only
/// carries the models. A family may be absent.
pub struct SensorModelBundle {
    sensor: SensorId,
    classifiers: BTreeMap<AnomalyFamily, Box<dyn AnomalyClassifier>>,
}

impl SensorModelBundle {
    pub fn new(sensor: impl Into<SensorId>) -> Self {
        Self {
            sensor: sensor.into(),
            classifiers: BTreeMap::new(),
        }
    }

    /// Add or replace the classifier of its family.
    pub fn insert(&mut self, classifier: Box<dyn AnomalyClassifier>) {
        self.classifiers.insert(classifier.family(), classifier);
    }

    pub fn with(mut self, classifier: Box<dyn AnomalyClassifier>) -> Self {
        self.insert(classifier);
        self
    }

    /// Load whatever classifiers the store holds for `sensor`.
    pub fn load(store: &ArtifactStore, sensor: &str) -> Result<Self, StoreError> {
        let mut bundle = Self::new(sensor);
        for family in AnomalyFamily::ALL {
            let key = ArtifactKey::classifier(sensor, family);
            if let Some(model) = store.read_opt::<TrainedModel>(&key)? {
                bundle.insert(Box::new(model.classifier));
            }
        }
        debug!(sensor, families = bundle.len(), "Model bundle loaded");
        Ok(bundle)
    }

    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    pub fn families(&self) -> Vec<AnomalyFamily> {
        self.classifiers.keys().copied().collect()
    }

    pub fn get(&self, family: AnomalyFamily) -> Option<&dyn AnomalyClassifier> {
        self.classifiers.get(&family).map(|c| c.as_ref())
    }
}

/// Single anomaly decision for one reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedVerdict {
    pub sensor: SensorId,
    pub anomalous: bool,
    pub confidence: f64,
    /// Name of the fusion policy that decided.
    pub policy: String,
    pub votes: Vec<FamilyVote>,
    /// Families with no usable classifier; they did not vote.
    pub missing: Vec<AnomalyFamily>,
}

impl FusedVerdict {
    pub fn flagged_families(&self) -> Vec<AnomalyFamily> {
        self.votes
            .iter()
            .filter(|v| v.flagged)
            .map(|v| v.family)
            .collect()
    }
}

/// Ensemble aggregator over a sensor's family classifiers.
pub struct AnomalyHandler {
    policy: Box<dyn FusionPolicy>,
    min_len: usize,
}

impl AnomalyHandler {
    /// `min_len` mirrors the motif length rule: readings must be longer.
    pub fn new(policy: Box<dyn FusionPolicy>, min_len: usize) -> Self {
        Self { policy, min_len }
    }

    /// OR fusion.
    pub fn any_family(min_len: usize) -> Self {
        Self::new(Box::new(AnyFamily), min_len)
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Extract each family's features from `reading`, query the bundle's
    /// classifiers and fuse the votes.
    ///
    /// Missing or unfitted classifiers are left out of the vote and listed
    /// in the verdict. A bundle trained for another sensor, or a
    /// feature-width mismatch, is an error.
    pub fn evaluate(
        &self,
        sensor: &str,
        reading: &[f64],
        bundle: &SensorModelBundle,
    ) -> Result<FusedVerdict, HandlerError> {
        if bundle.sensor() != sensor {
            return Err(HandlerError::SensorMismatch {
                sensor: sensor.to_string(),
                bundle: bundle.sensor().to_string(),
            });
        }
        Series::new(sensor, reading.to_vec()).validate()?;
        if reading.len() <= self.min_len {
            return Err(HandlerError::ReadingTooShort {
                sensor: sensor.to_string(),
                len: reading.len(),
                min: self.min_len,
            });
        }

        let mut votes = Vec::with_capacity(AnomalyFamily::ALL.len());
        let mut missing = Vec::new();

        for family in AnomalyFamily::ALL {
            let Some(classifier) = bundle.get(family) else {
                missing.push(family);
                continue;
            };
            let features = vec![(registry::spec(family).extract)(reading)];
            let probability = match classifier.predict_proba(&features) {
                Ok(p) => p.first().copied().unwrap_or(0.0),
                Err(ClassifierError::NotFitted) => {
                    missing.push(family);
                    continue;
                }
                Err(source) => return Err(HandlerError::Classifier { family, source }),
            };
            votes.push(FamilyVote {
                family,
                probability,
                flagged: probability >= classifier.threshold(),
            });
        }

        if votes.is_empty() {
            return Err(HandlerError::NoClassifiers(sensor.to_string()));
        }

        let fused = self.policy.fuse(&votes);
        Ok(FusedVerdict {
            sensor: sensor.to_string(),
            anomalous: fused.anomalous,
            confidence: fused.confidence,
            policy: self.policy.name().to_string(),
            votes,
            missing,
        })
    }
}

#[cfg(test)]
mod tests;
