//! Training runner -- owns the worker pool and folds job results.
//!
//! Split into focused submodules:
//! - `core`: TrainingRunner struct, constructor and accessors
//! - `execution`: the two-phase run and report assembly

mod core;
mod execution;

pub use self::core::TrainingRunner;
pub use self::execution::REPORT_NAME;
