use crate::pipeline::PipelineError;

/// Failure that aborts a whole run.
///
/// Degraded sensors never end up here; they are reported as exclusions.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Worker pool: {0}")]
    ThreadPool(String),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Artifact store: {0}")]
    Store(#[from] motifguard_store::StoreError),
}
