//! Best-effort cleanup that runs after a successful conform pass.
//!
//! Unlike the pass itself, nothing here is fatal: every failure is logged at
//! WARN and the next target is tried.

use std::path::{Path, PathBuf};

use conform_core::{fs_guard, paths, Housekeeping, WorkspaceState};

/// What housekeeping removed and what it had to leave behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HousekeepingOutcome {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Delete configured metadata subdirectories and empty configured
/// workspace directories, for every workspace.
pub async fn run(states: &[WorkspaceState], housekeeping: &Housekeeping) -> HousekeepingOutcome {
    let mut outcome = HousekeepingOutcome::default();
    if housekeeping.is_empty() {
        return outcome;
    }

    for state in states {
        for subdir in &housekeeping.metadata_subdirs {
            if let Some(target) = contained(&state.metadata_dir, subdir) {
                purge(target, Purge::Directory, &mut outcome).await;
            }
        }
        for subdir in &housekeeping.workspace_content_dirs {
            if let Some(target) = contained(&state.workspace_dir, subdir) {
                purge(target, Purge::Contents, &mut outcome).await;
            }
        }
    }
    outcome
}

#[derive(Debug, Clone, Copy)]
enum Purge {
    Directory,
    Contents,
}

fn contained(base: &Path, relative: &str) -> Option<PathBuf> {
    let target = base.join(relative);
    if Path::new(relative).is_absolute() || !paths::is_under_dir(&target, base) {
        tracing::warn!(
            base = %base.display(),
            entry = relative,
            "ignoring housekeeping entry that leaves its base directory"
        );
        return None;
    }
    Some(target)
}

async fn purge(target: PathBuf, mode: Purge, outcome: &mut HousekeepingOutcome) {
    match tokio::fs::try_exists(&target).await {
        Ok(true) => {}
        Ok(false) => return,
        Err(err) => {
            tracing::warn!(dir = %target.display(), error = %err, "unable to inspect");
            outcome.failed.push(target);
            return;
        }
    }
    let path = target.clone();
    let result = tokio::task::spawn_blocking(move || match mode {
        Purge::Directory => fs_guard::force_delete_dir(&path),
        Purge::Contents => fs_guard::force_delete_dir_contents(&path),
    })
    .await;

    match result {
        Ok(Ok(())) => {
            tracing::info!(dir = %target.display(), ?mode, "housekeeping removed");
            outcome.removed.push(target);
        }
        Ok(Err(err)) => {
            tracing::warn!(dir = %target.display(), error = %err, "unable to delete");
            outcome.failed.push(target);
        }
        Err(err) => {
            tracing::warn!(dir = %target.display(), error = %err, "housekeeping task failed");
            outcome.failed.push(target);
        }
    }
}
