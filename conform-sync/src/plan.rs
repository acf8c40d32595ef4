//! Offline preview of a conform pass.
//!
//! Resolves layouts, groups and protected directories exactly as the
//! reconciler would, but with each workspace's declared view and a
//! caller-supplied host name instead of anything the backend reports.

use std::path::{Path, PathBuf};

use serde::Serialize;

use conform_core::{ConformError, WorkspaceSpec, WorkspaceState};

use crate::cleanup::ProtectedPathSet;
use crate::grouper::{self, SyncGroup};
use crate::materializer;

#[derive(Debug, Clone, Serialize)]
pub struct PassPlan {
    pub root_dir: PathBuf,
    pub host: String,
    pub remove_untracked_files: bool,
    pub workspaces: Vec<WorkspaceState>,
    pub groups: Vec<SyncGroup>,
    pub protected_dirs: Vec<PathBuf>,
}

pub fn plan_pass(
    workspaces: &[WorkspaceSpec],
    root_dir: &Path,
    remove_untracked_files: bool,
    host: &str,
) -> Result<PassPlan, ConformError> {
    let states = workspaces
        .iter()
        .map(|spec| {
            let layout = materializer::resolve_layout(spec, root_dir, host)?;
            Ok(materializer::offline_state(spec, layout))
        })
        .collect::<Result<Vec<_>, ConformError>>()?;

    let groups = grouper::group(&states, remove_untracked_files);
    let protected = ProtectedPathSet::compute(root_dir, &states, remove_untracked_files);

    Ok(PassPlan {
        root_dir: root_dir.to_path_buf(),
        host: host.to_string(),
        remove_untracked_files,
        workspaces: states,
        groups,
        protected_dirs: protected.dirs().to_vec(),
    })
}
