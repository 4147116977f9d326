//! Fusion policies for per-family votes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use motifguard_core::AnomalyFamily;

/// One family classifier's opinion on a reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FamilyVote {
    pub family: AnomalyFamily,
    /// Positive-class probability.
    pub probability: f64,
    /// The classifier's own hard decision.
    pub flagged: bool,
}

/// Decision over the votes that were cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fused {
    pub anomalous: bool,
    /// Anomaly confidence in [0, 1].
    pub confidence: f64,
}

/// Combines the votes of the available families into one decision.
///
/// Only families with a trained classifier vote; `votes` is never empty.
pub trait FusionPolicy: Send + Sync {
    fn name(&self) -> &str;
    fn fuse(&self, votes: &[FamilyVote]) -> Fused;
}

/// Logical OR: anomalous as soon as any family flags.
///
/// The families model mutually exclusive failure modes, so a single
/// detection is enough. Confidence is the highest family probability. Under
/// independent per-family false-positive rates `f_i` the fused rate is
/// `1 - prod(1 - f_i)`: recall across failure modes is bought with a higher
/// false-positive rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyFamily;

impl FusionPolicy for AnyFamily {
    fn name(&self) -> &str {
        "any-family"
    }

    fn fuse(&self, votes: &[FamilyVote]) -> Fused {
        Fused {
            anomalous: votes.iter().any(|v| v.flagged),
            confidence: votes.iter().map(|v| v.probability).fold(0.0, f64::max),
        }
    }
}

/// Weighted mean probability compared against a threshold.
///
/// Weights are renormalized over the families that voted; a family with no
/// explicit weight counts 1.0.
#[derive(Debug, Clone)]
pub struct WeightedVote {
    weights: BTreeMap<AnomalyFamily, f64>,
    threshold: f64,
}

impl WeightedVote {
    pub fn new(threshold: f64) -> Self {
        Self {
            weights: BTreeMap::new(),
            threshold,
        }
    }

    pub fn with_weight(mut self, family: AnomalyFamily, weight: f64) -> Self {
        self.weights.insert(family, weight.max(0.0));
        self
    }

    fn weight(&self, family: AnomalyFamily) -> f64 {
        self.weights.get(&family).copied().unwrap_or(1.0)
    }
}

impl FusionPolicy for WeightedVote {
    fn name(&self) -> &str {
        "weighted-vote"
    }

    fn fuse(&self, votes: &[FamilyVote]) -> Fused {
        let total: f64 = votes.iter().map(|v| self.weight(v.family)).sum();
        let confidence = if total > 0.0 {
            votes
                .iter()
                .map(|v| self.weight(v.family) * v.probability)
                .sum::<f64>()
                / total
        } else {
            0.0
        };
        Fused {
            anomalous: confidence >= self.threshold,
            confidence,
        }
    }
}
