use rand::SeedableRng;

use motifguard_core::config::{ClassifierConfig, SegmentationConfig};
use motifguard_core::AnomalyFamily;
use motifguard_compute::pipeline::features::spike_features;
use motifguard_compute::pipeline::registry;
use motifguard_compute::{
    AnomalyClassifier, ClassificationMetrics, DatasetBuilder, ForestClassifier, SegmentOutcome,
    Segmenter,
};

use crate::helpers::{sinusoid_motifs, three_state_sinusoid};

#[test]
fn test_alpha_zero_is_a_no_op_for_every_family() {
    let motifs = sinusoid_motifs(5, 64);
    let mut rng = rand::rngs::StdRng::seed_from_u64(3);
    for spec in registry::REGISTRY.iter() {
        for motif in &motifs {
            let out = (spec.transform)(&motif.values, 0.0, &mut rng);
            assert_eq!(out.len(), motif.len());
            for (a, b) in out.iter().zip(&motif.values) {
                assert!((a - b).abs() < 1e-9, "{} changed a sample at alpha 0", spec.family);
            }
        }
    }
}

#[test]
fn test_rows_alternate_normal_and_synthetic() {
    let mut motifs = sinusoid_motifs(12, 40);
    // Too short to survive the length filter.
    motifs[3].values.truncate(10);
    motifs[8].values.truncate(4);

    let builder = DatasetBuilder::new(10, 2, 42);
    for family in AnomalyFamily::ALL {
        let alpha = if family == AnomalyFamily::PartialMissingSegment { 0.3 } else { 2.0 };
        let ds = builder.build("FIT_101", &motifs, family, alpha).unwrap();
        assert_eq!(ds.labels.len(), 2 * 10);
        assert_eq!(ds.features.len(), ds.labels.len());
        for i in 0..10 {
            assert_eq!(ds.labels[2 * i], 0);
            assert_eq!(ds.labels[2 * i + 1], 1);
        }
        assert!(ds
            .features
            .iter()
            .all(|row| row.len() == registry::spec(family).n_features()));
    }
}

#[test]
fn test_spike_examples_peak_higher_than_their_normal_pair() {
    let segmenter = Segmenter::new(SegmentationConfig::default(), 42);
    let series = three_state_sinusoid("FIT_101", 5000, 250);
    let SegmentOutcome::Segmented(segmentation) = segmenter.segment(&series).unwrap() else {
        panic!("three-regime series should segment");
    };

    let ds = DatasetBuilder::new(10, 2, 42)
        .build("FIT_101", &segmentation.motifs, AnomalyFamily::Spike, 3.0)
        .unwrap();

    // Feature 0 is the peak |z| of the motif.
    let pairs: Vec<(f64, f64)> = ds
        .features
        .chunks(2)
        .map(|pair| (pair[0][0], pair[1][0]))
        .collect();
    let higher = pairs.iter().filter(|(normal, synthetic)| synthetic > normal).count();
    assert!(higher * 10 >= pairs.len() * 9, "{} of {} pairs peaked higher", higher, pairs.len());

    let mean_normal = pairs.iter().map(|p| p.0).sum::<f64>() / pairs.len() as f64;
    let mean_synthetic = pairs.iter().map(|p| p.1).sum::<f64>() / pairs.len() as f64;
    assert!(mean_synthetic > mean_normal);
}

#[test]
fn test_peak_feature_sees_a_single_spike() {
    let motif = sinusoid_motifs(1, 100).remove(0).values;
    let mut spiked = motif.clone();
    spiked[50] += 8.0;
    assert!(spike_features(&spiked)[0] > spike_features(&motif)[0]);
}

#[test]
fn test_200_balanced_examples_train_above_chance() {
    let motifs = sinusoid_motifs(100, 80);
    let builder = DatasetBuilder::new(10, 2, 42);

    for family in AnomalyFamily::ALL {
        let alpha = if family == AnomalyFamily::PartialMissingSegment { 0.3 } else { 2.0 };
        let ds = builder.build("FIT_101", &motifs, family, alpha).unwrap();
        assert_eq!(ds.len(), 200);
        assert_eq!(ds.labels.iter().filter(|&&l| l == 1).count(), 100);

        let mut clf = ForestClassifier::for_family(family, &ClassifierConfig::default(), 11);
        clf.fit(&ds.features, &ds.labels).unwrap();
        let predicted = clf.predict(&ds.features).unwrap();
        let scores = clf.predict_proba(&ds.features).unwrap();
        let metrics = ClassificationMetrics::compute(&ds.labels, &predicted, &scores);
        assert!(metrics.accuracy > 0.5, "{} trained to {}", family, metrics);
    }
}
