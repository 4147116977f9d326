pub mod algorithms;
pub mod pipeline;
pub mod scheduler;

pub use pipeline::classifier::{AnomalyClassifier, ClassifierError, ForestClassifier};
pub use pipeline::dataset::{DatasetBuilder, DatasetError, LabeledDataset};
pub use pipeline::evaluation::{evaluate_table, EvaluationReport};
pub use pipeline::fusion::{AnyFamily, FamilyVote, FusionPolicy, WeightedVote};
pub use pipeline::handler::{AnomalyHandler, FusedVerdict, HandlerError, SensorModelBundle, TrainedModel};
pub use pipeline::metrics::PipelineMetrics;
pub use pipeline::report::{ClassificationMetrics, Exclusion, ExclusionReason, RunReport};
pub use pipeline::segmenter::{SegmentError, SegmentOutcome, Segmentation, Segmenter};
pub use pipeline::{PipelineError, SensorPipeline};
pub use scheduler::{RunError, TrainingRunner, REPORT_NAME};
