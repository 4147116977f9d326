pub mod artifacts;
pub mod claim;
pub mod codec;
pub mod error;

// Re-export key types
pub use artifacts::{ArtifactKey, ArtifactMeta, ArtifactStore, WriteOutcome};
pub use claim::Claim;
pub use error::StoreError;
