use super::*;
use crate::pipeline::fusion::WeightedVote;

/// Classifier double returning a fixed probability.
struct Fixed {
    family: AnomalyFamily,
    probability: f64,
    fitted: bool,
}

impl Fixed {
    fn boxed(family: AnomalyFamily, probability: f64) -> Box<dyn AnomalyClassifier> {
        Box::new(Self {
            family,
            probability,
            fitted: true,
        })
    }
}

impl AnomalyClassifier for Fixed {
    fn family(&self) -> AnomalyFamily {
        self.family
    }

    fn fit(&mut self, _x: &[Vec<f64>], _y: &[u8]) -> Result<(), ClassifierError> {
        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ClassifierError> {
        if !self.fitted {
            return Err(ClassifierError::NotFitted);
        }
        Ok(vec![self.probability; x.len()])
    }

    fn n_features(&self) -> Option<usize> {
        Some(registry::spec(self.family).n_features())
    }
}

fn reading() -> Vec<f64> {
    (0..60).map(|i| (i as f64 * 0.2).sin()).collect()
}

fn full_bundle(flagging: Option<AnomalyFamily>) -> SensorModelBundle {
    AnomalyFamily::ALL
        .into_iter()
        .fold(SensorModelBundle::new("FIT_101"), |bundle, family| {
            let p = if Some(family) == flagging { 0.95 } else { 0.05 };
            bundle.with(Fixed::boxed(family, p))
        })
}

#[test]
fn single_flagging_family_makes_the_reading_anomalous() {
    let handler = AnomalyHandler::any_family(10);
    for family in AnomalyFamily::ALL {
        let verdict = handler.evaluate("FIT_101", &reading(), &full_bundle(Some(family))).unwrap();
        assert!(verdict.anomalous, "{} alone should flag", family);
        assert_eq!(verdict.flagged_families(), vec![family]);
        assert_eq!(verdict.votes.len(), 4);
        assert!((verdict.confidence - 0.95).abs() < 1e-12);
    }
}

#[test]
fn quiet_bundle_is_normal() {
    let handler = AnomalyHandler::any_family(10);
    let verdict = handler.evaluate("FIT_101", &reading(), &full_bundle(None)).unwrap();
    assert!(!verdict.anomalous);
    assert!(verdict.missing.is_empty());
    assert_eq!(verdict.policy, "any-family");
}

#[test]
fn missing_family_is_excluded_from_the_vote() {
    let bundle = SensorModelBundle::new("FIT_101")
        .with(Fixed::boxed(AnomalyFamily::Spike, 0.1))
        .with(Fixed::boxed(AnomalyFamily::PowerSpectralDistortion, 0.7));
    let verdict = AnomalyHandler::any_family(10)
        .evaluate("FIT_101", &reading(), &bundle)
        .unwrap();
    assert!(verdict.anomalous);
    assert_eq!(
        verdict.missing,
        vec![AnomalyFamily::LevelNoise, AnomalyFamily::PartialMissingSegment]
    );
    assert_eq!(verdict.votes.len(), 2);
}

#[test]
fn unfitted_classifier_counts_as_missing() {
    let bundle = SensorModelBundle::new("FIT_101")
        .with(Fixed::boxed(AnomalyFamily::Spike, 0.2))
        .with(Box::new(Fixed {
            family: AnomalyFamily::LevelNoise,
            probability: 0.9,
            fitted: false,
        }));
    let verdict = AnomalyHandler::any_family(10)
        .evaluate("FIT_101", &reading(), &bundle)
        .unwrap();
    assert!(!verdict.anomalous);
    assert!(verdict.missing.contains(&AnomalyFamily::LevelNoise));
}

#[test]
fn empty_bundle_is_an_error() {
    let result = AnomalyHandler::any_family(10).evaluate(
        "FIT_101",
        &reading(),
        &SensorModelBundle::new("FIT_101"),
    );
    assert!(matches!(result, Err(HandlerError::NoClassifiers(_))));
}

#[test]
fn bundle_of_another_sensor_is_rejected() {
    let result = AnomalyHandler::any_family(10).evaluate("LIT_101", &reading(), &full_bundle(None));
    match result {
        Err(HandlerError::SensorMismatch { sensor, bundle }) => {
            assert_eq!(sensor, "LIT_101");
            assert_eq!(bundle, "FIT_101");
        }
        other => panic!("expected a sensor mismatch, got {:?}", other.map(|v| v.anomalous)),
    }
}

#[test]
fn short_or_malformed_readings_are_rejected() {
    let handler = AnomalyHandler::any_family(10);
    let bundle = full_bundle(None);
    assert!(matches!(
        handler.evaluate("FIT_101", &[1.0; 10], &bundle),
        Err(HandlerError::ReadingTooShort { len: 10, .. })
    ));
    let mut bad = reading();
    bad[3] = f64::NAN;
    assert!(matches!(
        handler.evaluate("FIT_101", &bad, &bundle),
        Err(HandlerError::InvalidReading(_))
    ));
}

#[test]
fn width_mismatch_is_an_error() {
    let x = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
    let mut clf = ForestClassifier::for_family(
        AnomalyFamily::Spike,
        &motifguard_core::config::ClassifierConfig::default(),
        1,
    );
    clf.fit(&x, &[0, 1]).unwrap();
    let bundle = SensorModelBundle::new("FIT_101").with(Box::new(clf));

    let result = AnomalyHandler::any_family(10).evaluate("FIT_101", &reading(), &bundle);
    assert!(matches!(
        result,
        Err(HandlerError::Classifier {
            family: AnomalyFamily::Spike,
            source: ClassifierError::DimensionMismatch { expected: 2, .. }
        })
    ));
}

#[test]
fn weighted_policy_needs_agreement() {
    let handler = AnomalyHandler::new(Box::new(WeightedVote::new(0.5)), 10);
    let verdict = handler
        .evaluate("FIT_101", &reading(), &full_bundle(Some(AnomalyFamily::Spike)))
        .unwrap();
    assert!(!verdict.anomalous);
    assert_eq!(verdict.policy, "weighted-vote");
}
