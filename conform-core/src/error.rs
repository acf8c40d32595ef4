//! Error types for conform-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure reported by the version-control backend.
///
/// Every backend operation fails with this one type; the reconciler treats it
/// uniformly as fatal for the current pass and wraps it with the phase that
/// was running.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
    #[source]
    source: Option<BoxedSource>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The half of a sync that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Simple-strategy clean of a single workspace.
    Clean,
    /// Populate-strategy planning (clean + snapshot) across a group.
    Plan,
    /// The scheduled sync itself (either strategy).
    Sync,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Clean => write!(f, "clean"),
            SyncPhase::Plan => write!(f, "plan"),
            SyncPhase::Sync => write!(f, "sync"),
        }
    }
}

/// All errors that abort a conform pass.
#[derive(Debug, Error)]
pub enum ConformError {
    /// A desired workspace could not be materialized (bad path, unreachable backend).
    #[error("failed to set up workspace '{identifier}': {reason}")]
    WorkspaceSetup {
        identifier: String,
        reason: String,
        #[source]
        source: Option<BackendError>,
    },

    /// Backend identity query or client listing failed.
    #[error("failed to enumerate clients on {server}: {source}")]
    Enumeration {
        server: String,
        #[source]
        source: BackendError,
    },

    /// An orphaned client record could not be reverted or deleted.
    #[error("failed to delete client {client}: {source}")]
    ClientDeletion {
        client: String,
        #[source]
        source: BackendError,
    },

    /// A stray file or directory under the agent root could not be removed.
    #[error("failed to delete {path}: {source}")]
    PathDeletion {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reverting pending changes in a kept workspace failed.
    #[error("failed to revert open changes in client {client}: {source}")]
    Revert {
        client: String,
        #[source]
        source: BackendError,
    },

    /// A plan or sync step failed for a group.
    #[error("{phase} failed for {metadata_dir}: {source}")]
    Sync {
        metadata_dir: PathBuf,
        phase: SyncPhase,
        #[source]
        source: BackendError,
    },

    /// The pass observed a cancellation request before starting its next call.
    #[error("conform pass cancelled")]
    Cancelled,
}

impl ConformError {
    pub fn setup(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        ConformError::WorkspaceSetup {
            identifier: identifier.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub fn setup_backend(identifier: impl Into<String>, source: BackendError) -> Self {
        ConformError::WorkspaceSetup {
            identifier: identifier.into(),
            reason: "backend unavailable".to_string(),
            source: Some(source),
        }
    }
}

/// All errors that can arise from manifest operations.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The manifest parsed but describes something unusable.
    #[error("invalid manifest at {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.conform/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The manifest file did not exist at the expected path.
    #[error("manifest not found at {path}")]
    NotFound { path: PathBuf },
}
