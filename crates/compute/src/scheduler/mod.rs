//! Worker-pool execution of the training pipeline.
//!
//! A run is two fan-outs over a rayon pool: segmentation (one job per
//! sensor), then dataset synthesis and classifier training (one job per
//! sensor and family). Jobs share nothing but the artifact store, and
//! results are collected in (sensor, family) order.

pub mod runner;
pub mod task;
pub mod types;

pub use runner::{TrainingRunner, REPORT_NAME};
pub use task::RunError;
pub use types::{training_jobs, TrainingJob};
