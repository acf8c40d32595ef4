//! Stray-path cleanup under the agent root.
//!
//! Every regular file directly inside the root goes; every direct
//! subdirectory goes unless it is in the [`ProtectedPathSet`]. Failures abort
//! the pass.

use std::path::{Path, PathBuf};

use conform_core::{fs_guard, paths, ConformError, WorkspaceState};

use crate::context::ConformContext;

/// Directories under the agent root that stray-cleanup must never delete.
///
/// Computed once per pass from the materialized states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPathSet {
    dirs: Vec<PathBuf>,
}

impl ProtectedPathSet {
    /// `{root/Temp, root/Saved}` (only when untracked files are kept) plus the
    /// metadata directory of every state.
    pub fn compute(root_dir: &Path, states: &[WorkspaceState], remove_untracked_files: bool) -> Self {
        let mut dirs = Vec::new();
        if !remove_untracked_files {
            dirs.push(root_dir.join(paths::TEMP_DIR_NAME));
            dirs.push(root_dir.join(paths::SAVED_DIR_NAME));
        }
        for state in states {
            if !dirs.iter().any(|d| paths::same_dir(d, &state.metadata_dir)) {
                dirs.push(state.metadata_dir.clone());
            }
        }
        Self { dirs }
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.iter().any(|d| paths::same_dir(d, dir))
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

/// What stray-cleanup did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrayCleanup {
    pub deleted_files: Vec<PathBuf>,
    pub deleted_dirs: Vec<PathBuf>,
    pub kept_dirs: Vec<PathBuf>,
}

/// Remove stray files and unprotected directories directly under `root_dir`.
///
/// A missing root is a no-op. Entries are processed in name order so logs
/// are reproducible.
pub async fn clean_stray_paths(
    root_dir: &Path,
    protected: &ProtectedPathSet,
    ctx: &ConformContext,
) -> Result<StrayCleanup, ConformError> {
    let mut outcome = StrayCleanup::default();
    let exists = tokio::fs::try_exists(root_dir)
        .await
        .map_err(|source| ConformError::PathDeletion {
            path: root_dir.to_path_buf(),
            source,
        })?;
    if !exists {
        tracing::debug!(root = %root_dir.display(), "agent root missing; nothing to clean");
        return Ok(outcome);
    }

    ctx.checkpoint()?;
    let (files, dirs) = list_entries(root_dir).await?;

    for file in files {
        ctx.checkpoint()?;
        tracing::info!(file = %file.display(), "deleting file");
        delete_blocking(file.clone(), fs_guard::force_delete_file).await?;
        outcome.deleted_files.push(file);
    }

    for dir in dirs {
        if protected.contains(&dir) {
            tracing::info!(dir = %dir.display(), "keeping directory");
            outcome.kept_dirs.push(dir);
            continue;
        }
        ctx.checkpoint()?;
        tracing::info!(dir = %dir.display(), "deleting directory");
        delete_blocking(dir.clone(), fs_guard::force_delete_dir).await?;
        outcome.deleted_dirs.push(dir);
    }

    Ok(outcome)
}

async fn list_entries(root_dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), ConformError> {
    let read_err = |source| ConformError::PathDeletion {
        path: root_dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    let mut entries = tokio::fs::read_dir(root_dir).await.map_err(read_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let file_type = entry.file_type().await.map_err(read_err)?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        } else {
            files.push(entry.path());
        }
    }
    files.sort();
    dirs.sort();
    Ok((files, dirs))
}

async fn delete_blocking(
    path: PathBuf,
    delete: fn(&Path) -> std::io::Result<()>,
) -> Result<(), ConformError> {
    let target = path.clone();
    let result = tokio::task::spawn_blocking(move || delete(&target))
        .await
        .unwrap_or_else(|join| Err(std::io::Error::new(std::io::ErrorKind::Other, join)));
    result.map_err(|source| ConformError::PathDeletion { path, source })
}
