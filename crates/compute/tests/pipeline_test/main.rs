/// Integration tests for the training pipeline covering segmentation
/// scenarios, synthetic datasets, resumable runs and inference over stored
/// model bundles.

mod datasets;
mod helpers;
mod inference;
mod resume;
mod scenarios;
