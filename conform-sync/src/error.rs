//! Error types for conform-sync.

use thiserror::Error;

use conform_core::{ConformError, ManifestError};

/// Errors from a manifest-driven pipeline run.
///
/// Pass failures are passed through untouched so callers can still match on
/// the [`ConformError`] variant that aborted the pass.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The manifest could not be loaded.
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// The conform pass failed.
    #[error(transparent)]
    Conform(#[from] ConformError),
}

impl PipelineError {
    /// The pass error, if the failure happened inside the pass.
    pub fn as_conform(&self) -> Option<&ConformError> {
        match self {
            PipelineError::Conform(err) => Some(err),
            PipelineError::Manifest(_) => None,
        }
    }
}
