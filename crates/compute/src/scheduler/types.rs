use motifguard_core::AnomalyFamily;

use crate::pipeline::segmenter::Segmentation;

/// One (sensor, family) unit of the training phase.
#[derive(Debug, Clone, Copy)]
pub struct TrainingJob<'a> {
    pub segmentation: &'a Segmentation,
    pub family: AnomalyFamily,
}

/// Every family of every segmented sensor, in (sensor, family) order when
/// `segmented` is sorted by sensor.
pub fn training_jobs<'a>(segmented: &[&'a Segmentation]) -> Vec<TrainingJob<'a>> {
    segmented
        .iter()
        .flat_map(|&segmentation| {
            AnomalyFamily::ALL
                .into_iter()
                .map(move |family| TrainingJob {
                    segmentation,
                    family,
                })
        })
        .collect()
}
