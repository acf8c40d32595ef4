//! SyncGrouper: partition materialized workspaces by the metadata directory
//! they share and pick a sync strategy per partition.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use conform_core::WorkspaceState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Clean then incremental sync against the existing have-table.
    Simple,
    /// Coordinated plan-then-sync across every member of the group.
    Populate,
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStrategy::Simple => write!(f, "simple"),
            SyncStrategy::Populate => write!(f, "populate"),
        }
    }
}

/// Workspaces sharing one metadata directory. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncGroup {
    pub metadata_dir: PathBuf,
    pub members: Vec<WorkspaceState>,
    pub strategy: SyncStrategy,
}

/// The fast path is only safe for a lone workspace that keeps untracked
/// files, in a pass that also keeps them.
pub fn select_strategy(members: &[WorkspaceState], remove_untracked_files: bool) -> SyncStrategy {
    match members {
        [only] if !only.remove_untracked_files && !remove_untracked_files => SyncStrategy::Simple,
        _ => SyncStrategy::Populate,
    }
}

/// Groups in ascending metadata-directory order; members keep input order.
pub fn group(states: &[WorkspaceState], remove_untracked_files: bool) -> Vec<SyncGroup> {
    let mut by_dir: BTreeMap<PathBuf, Vec<WorkspaceState>> = BTreeMap::new();
    for state in states {
        by_dir
            .entry(state.metadata_dir.clone())
            .or_default()
            .push(state.clone());
    }

    by_dir
        .into_iter()
        .map(|(metadata_dir, members)| {
            let strategy = select_strategy(&members, remove_untracked_files);
            SyncGroup {
                metadata_dir,
                members,
                strategy,
            }
        })
        .collect()
}
