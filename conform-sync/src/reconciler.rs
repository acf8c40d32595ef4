//! Reconciler: one conform pass.
//!
//! ```text
//! materialize all ─▶ one connection per (server, user) ─▶ scan + delete orphans
//!   ─▶ clean stray local paths ─▶ revert open changes ─▶ plan every group ─▶ sync every group
//! ```
//!
//! Every step depends on the previous one, so they run strictly in order.
//! Any failure aborts the pass; connections opened by the pass are released
//! whether it succeeded or not. Nothing is retried here.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;

use conform_core::{
    paths, BackendError, ConformError, ConnectionSettings, PopulatePlan, PopulateRequest, SyncPhase,
    SyncTarget, WorkspaceSpec, WorkspaceState,
};

use crate::cleanup::{self, ProtectedPathSet};
use crate::context::ConformContext;
use crate::grouper::{self, SyncGroup, SyncStrategy};
use crate::materializer;
use crate::scanner::{self, KeptClients};
use crate::vcs::{ConnectionPool, VcsConnection, VcsConnector};

/// Summary of one group as it was scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub metadata_dir: PathBuf,
    pub strategy: SyncStrategy,
    pub clients: Vec<String>,
}

/// What a successful pass did.
#[derive(Debug, Clone, Serialize)]
pub struct ConformReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub workspaces: Vec<WorkspaceState>,
    pub deleted_clients: Vec<String>,
    pub deleted_files: Vec<PathBuf>,
    pub deleted_dirs: Vec<PathBuf>,
    pub kept_dirs: Vec<PathBuf>,
    pub reverted_clients: Vec<String>,
    pub groups: Vec<GroupReport>,
}

impl ConformReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            workspaces: Vec::new(),
            deleted_clients: Vec::new(),
            deleted_files: Vec::new(),
            deleted_dirs: Vec::new(),
            kept_dirs: Vec::new(),
            reverted_clients: Vec::new(),
            groups: Vec::new(),
        }
    }
}

/// A sync deferred until every group has finished planning.
enum ScheduledSync {
    Simple {
        workspace: WorkspaceState,
    },
    Populate {
        metadata_dir: PathBuf,
        settings: ConnectionSettings,
        requests: Vec<PopulateRequest>,
        plans: Vec<PopulatePlan>,
    },
}

/// Brings local and remote workspace state in line with a desired list.
///
/// Not safe to run twice concurrently for the same root; callers serialize.
pub struct Reconciler<'c> {
    connector: &'c dyn VcsConnector,
}

impl<'c> Reconciler<'c> {
    pub fn new(connector: &'c dyn VcsConnector) -> Self {
        Self { connector }
    }

    /// Run one conform pass over `workspaces` under `root_dir`.
    ///
    /// `root_dir` must be absolute; a relative root is rejected before any
    /// connection is opened or any path is touched.
    pub async fn conform(
        &self,
        workspaces: &[WorkspaceSpec],
        root_dir: &Path,
        remove_untracked_files: bool,
        ctx: &ConformContext,
    ) -> Result<ConformReport, ConformError> {
        let root_dir = paths::normalize(root_dir).ok_or_else(|| {
            ConformError::setup(
                root_dir.display().to_string(),
                format!("agent root '{}' is not an absolute path", root_dir.display()),
            )
        })?;

        let mut pool = ConnectionPool::new(self.connector);
        let result = self
            .run_pass(&mut pool, workspaces, &root_dir, remove_untracked_files, ctx)
            .instrument(ctx.span().clone())
            .await;
        let released = pool.release_all().await;
        tracing::debug!(released, "released backend connections");
        result
    }

    async fn run_pass(
        &self,
        pool: &mut ConnectionPool<'_>,
        workspaces: &[WorkspaceSpec],
        root_dir: &Path,
        remove_untracked_files: bool,
        ctx: &ConformContext,
    ) -> Result<ConformReport, ConformError> {
        let mut report = ConformReport::new(Utc::now());

        tracing::info!("workspaces:");
        for spec in workspaces {
            tracing::info!(
                identifier = %spec.identifier,
                stream = %spec.stream,
                incremental = spec.incremental,
                "  desired workspace"
            );
        }

        let states = materialize_all(pool, workspaces, root_dir, ctx)
            .instrument(ctx.phase("materialize"))
            .await?;

        let connections = unique_connections(&states);
        for settings in &connections {
            ctx.checkpoint()?;
            pool.get_or_connect(settings)
                .await
                .map_err(|source| ConformError::Enumeration {
                    server: settings.server_and_port.clone(),
                    source,
                })?;
        }

        report.deleted_clients = delete_orphans(pool, &connections, root_dir, &states, ctx)
            .instrument(ctx.phase("scan"))
            .await?;

        let protected = ProtectedPathSet::compute(root_dir, &states, remove_untracked_files);
        let stray = cleanup::clean_stray_paths(root_dir, &protected, ctx)
            .instrument(ctx.phase("clean"))
            .await?;
        report.deleted_files = stray.deleted_files;
        report.deleted_dirs = stray.deleted_dirs;
        report.kept_dirs = stray.kept_dirs;

        report.reverted_clients = revert_open_changes(pool, &states, ctx)
            .instrument(ctx.phase("revert"))
            .await?;

        let groups = grouper::group(&states, remove_untracked_files);
        report.groups = groups.iter().map(group_report).collect();
        sync_groups(pool, &groups, ctx)
            .instrument(ctx.phase("sync"))
            .await?;

        report.workspaces = states;
        report.finished_at = Utc::now();
        tracing::info!(
            deleted_clients = report.deleted_clients.len(),
            deleted_dirs = report.deleted_dirs.len(),
            groups = report.groups.len(),
            "conform pass complete"
        );
        Ok(report)
    }
}

async fn materialize_all(
    pool: &mut ConnectionPool<'_>,
    workspaces: &[WorkspaceSpec],
    root_dir: &Path,
    ctx: &ConformContext,
) -> Result<Vec<WorkspaceState>, ConformError> {
    let mut states = Vec::with_capacity(workspaces.len());
    for spec in workspaces {
        ctx.checkpoint()?;
        let connection = pool
            .get_or_connect(&spec.connection_settings())
            .await
            .map_err(|e| ConformError::setup_backend(&spec.identifier, e))?;
        states.push(materializer::materialize(spec, root_dir, connection, ctx).await?);
    }
    Ok(states)
}

/// One settings entry per connection key, in first-seen order.
pub fn unique_connections(states: &[WorkspaceState]) -> Vec<ConnectionSettings> {
    let mut seen = HashSet::new();
    states
        .iter()
        .map(WorkspaceState::connection_settings)
        .filter(|settings| seen.insert(settings.key()))
        .collect()
}

async fn delete_orphans(
    pool: &mut ConnectionPool<'_>,
    connections: &[ConnectionSettings],
    root_dir: &Path,
    states: &[WorkspaceState],
    ctx: &ConformContext,
) -> Result<Vec<String>, ConformError> {
    let kept = KeptClients::from_states(states);
    let mut deleted = Vec::new();

    for settings in connections {
        let connection = pooled(pool, settings).await?;
        let scan = scanner::scan(connection, root_dir, &kept, ctx).await?;

        for classified in &scan.clients {
            if classified.verdict == scanner::ClientVerdict::Kept {
                tracing::info!(client = %classified.client.name, "keeping client");
            }
        }

        for orphan in scan.orphans() {
            let deletion = |source| ConformError::ClientDeletion {
                client: orphan.name.clone(),
                source,
            };
            tracing::info!(client = %orphan.name, root = %orphan.root, "deleting client");
            ctx.checkpoint()?;
            connection.revert_all(&orphan.name).await.map_err(deletion)?;
            ctx.checkpoint()?;
            connection.delete_client(&orphan.name).await.map_err(deletion)?;
            deleted.push(orphan.name.clone());
        }
    }
    Ok(deleted)
}

async fn revert_open_changes(
    pool: &mut ConnectionPool<'_>,
    states: &[WorkspaceState],
    ctx: &ConformContext,
) -> Result<Vec<String>, ConformError> {
    let mut reverted_names = HashSet::new();
    let mut reverted = Vec::new();
    for state in states {
        if !reverted_names.insert(state.client_name.to_lowercase()) {
            continue;
        }
        let connection = pooled(pool, &state.connection_settings()).await?;
        ctx.checkpoint()?;
        connection
            .revert_all(&state.client_name)
            .await
            .map_err(|source| ConformError::Revert {
                client: state.client_name.clone(),
                source,
            })?;
        reverted.push(state.client_name.clone());
    }
    Ok(reverted)
}

/// Plan every group, then run every scheduled sync.
///
/// Cleans and populate plans touch shared cache state, so no sync starts
/// until the last group has planned.
async fn sync_groups(
    pool: &mut ConnectionPool<'_>,
    groups: &[SyncGroup],
    ctx: &ConformContext,
) -> Result<(), ConformError> {
    let mut scheduled = Vec::with_capacity(groups.len());

    for group in groups {
        tracing::info!(
            metadata_dir = %group.metadata_dir.display(),
            strategy = %group.strategy,
            "queuing workspaces for sync/populate"
        );
        for member in &group.members {
            tracing::info!(
                stream = %member.stream,
                remove_untracked_files = member.remove_untracked_files,
                workspace_dir = %member.workspace_dir.display(),
                client = %member.client_name,
                "  member"
            );
        }

        let Some(first) = group.members.first() else {
            continue;
        };
        let failed = move |phase| {
            move |source| ConformError::Sync {
                metadata_dir: group.metadata_dir.clone(),
                phase,
                source,
            }
        };

        match group.strategy {
            SyncStrategy::Simple => {
                let connection = pooled(pool, &first.connection_settings()).await?;
                ctx.checkpoint()?;
                connection
                    .simple_clean(first)
                    .await
                    .map_err(failed(SyncPhase::Clean))?;
                scheduled.push(ScheduledSync::Simple {
                    workspace: first.clone(),
                });
            }
            SyncStrategy::Populate => {
                for (settings, members) in members_by_connection(&group.members) {
                    let requests: Vec<PopulateRequest> =
                        members.iter().map(|m| m.populate_request()).collect();
                    let connection = pooled(pool, &settings).await?;
                    ctx.checkpoint()?;
                    let plans = connection
                        .populate_clean(&requests)
                        .await
                        .map_err(failed(SyncPhase::Plan))?;
                    if plans.len() != requests.len() {
                        return Err(failed(SyncPhase::Plan)(BackendError::new(format!(
                            "backend returned {} plans for {} members",
                            plans.len(),
                            requests.len()
                        ))));
                    }
                    scheduled.push(ScheduledSync::Populate {
                        metadata_dir: group.metadata_dir.clone(),
                        settings,
                        requests,
                        plans,
                    });
                }
            }
        }
    }

    for action in scheduled {
        ctx.checkpoint()?;
        match action {
            ScheduledSync::Simple { workspace } => {
                let connection = pooled(pool, &workspace.connection_settings()).await?;
                connection
                    .simple_sync(&workspace, SyncTarget::Latest, None)
                    .await
                    .map_err(|source| ConformError::Sync {
                        metadata_dir: workspace.metadata_dir.clone(),
                        phase: SyncPhase::Sync,
                        source,
                    })?;
            }
            ScheduledSync::Populate {
                metadata_dir,
                settings,
                requests,
                plans,
            } => {
                let connection = pooled(pool, &settings).await?;
                connection
                    .populate_sync(&requests, &plans, false)
                    .await
                    .map_err(|source| ConformError::Sync {
                        metadata_dir,
                        phase: SyncPhase::Sync,
                        source,
                    })?;
            }
        }
    }
    Ok(())
}

/// Split a group's members by the connection that owns their clients,
/// preserving member order within each batch and first-seen batch order.
fn members_by_connection(
    members: &[WorkspaceState],
) -> Vec<(ConnectionSettings, Vec<&WorkspaceState>)> {
    let mut batches: Vec<(ConnectionSettings, Vec<&WorkspaceState>)> = Vec::new();
    for member in members {
        let settings = member.connection_settings();
        let key = settings.key();
        match batches.iter_mut().find(|(s, _)| s.key() == key) {
            Some((_, batch)) => batch.push(member),
            None => batches.push((settings, vec![member])),
        }
    }
    batches
}

async fn pooled<'p>(
    pool: &'p mut ConnectionPool<'_>,
    settings: &ConnectionSettings,
) -> Result<&'p mut dyn VcsConnection, ConformError> {
    pool.get_or_connect(settings)
        .await
        .map_err(|source| ConformError::Enumeration {
            server: settings.server_and_port.clone(),
            source,
        })
}

fn group_report(group: &SyncGroup) -> GroupReport {
    GroupReport {
        metadata_dir: group.metadata_dir.clone(),
        strategy: group.strategy,
        clients: group.members.iter().map(|m| m.client_name.clone()).collect(),
    }
}
