//! Shared entrypoints used by the CLI: manifest-driven pass, and a read-only
//! fleet inspection.

use std::collections::HashSet;
use std::path::Path;

use tracing::Instrument;

use conform_core::{manifest, ConformError, ConnectionSettings, Manifest};

use crate::context::ConformContext;
use crate::housekeeping;
use crate::materializer;
use crate::reconciler::{ConformReport, Reconciler};
use crate::scanner::{self, FleetScan, KeptClients};
use crate::vcs::{ConnectionPool, VcsConnector};
use crate::PipelineError;

/// Conform to `manifest`, then run best-effort housekeeping.
///
/// Housekeeping only runs when the pass succeeded and never fails the run.
pub async fn run(
    manifest: &Manifest,
    connector: &dyn VcsConnector,
    ctx: &ConformContext,
) -> Result<ConformReport, PipelineError> {
    let report = Reconciler::new(connector)
        .conform(
            &manifest.workspaces,
            &manifest.root_dir,
            manifest.remove_untracked_files,
            ctx,
        )
        .await?;

    let outcome = housekeeping::run(&report.workspaces, &manifest.housekeeping)
        .instrument(ctx.phase("housekeeping"))
        .await;
    if !outcome.failed.is_empty() {
        tracing::warn!(
            failed = outcome.failed.len(),
            "housekeeping left some directories in place"
        );
    }
    Ok(report)
}

/// Load the manifest at `path` and [`run`] it.
pub async fn run_from_file(
    path: &Path,
    connector: &dyn VcsConnector,
    ctx: &ConformContext,
) -> Result<ConformReport, PipelineError> {
    let manifest = manifest::load_from(path)?;
    run(&manifest, connector, ctx).await
}

/// Classify every client each manifest connection can see, without
/// changing anything.
///
/// Kept names are derived from the manifest using the host each backend
/// reports, so verdicts match what a pass on this agent would decide.
pub async fn inspect_fleet(
    manifest: &Manifest,
    connector: &dyn VcsConnector,
    ctx: &ConformContext,
) -> Result<Vec<FleetScan>, ConformError> {
    let mut pool = ConnectionPool::new(connector);
    let result = inspect_with(&mut pool, manifest, ctx)
        .instrument(ctx.phase("inspect"))
        .await;
    pool.release_all().await;
    result
}

async fn inspect_with(
    pool: &mut ConnectionPool<'_>,
    manifest: &Manifest,
    ctx: &ConformContext,
) -> Result<Vec<FleetScan>, ConformError> {
    let mut scans = Vec::new();
    for settings in manifest_connections(manifest) {
        ctx.checkpoint()?;
        let enumeration = |source| ConformError::Enumeration {
            server: settings.server_and_port.clone(),
            source,
        };
        let connection = pool.get_or_connect(&settings).await.map_err(enumeration)?;
        let info = connection.backend_info().await.map_err(enumeration)?;

        let mut names = Vec::with_capacity(manifest.workspaces.len());
        for spec in &manifest.workspaces {
            let layout = materializer::resolve_layout(spec, &manifest.root_dir, &info.local_host)?;
            names.push(layout.client_name);
        }
        let kept = KeptClients::from_names(names.iter().map(String::as_str));

        let scan = scanner::scan_with_info(connection, info, &manifest.root_dir, &kept, ctx).await?;
        scans.push(scan);
    }
    Ok(scans)
}

fn manifest_connections(manifest: &Manifest) -> Vec<ConnectionSettings> {
    let mut seen = HashSet::new();
    manifest
        .workspaces
        .iter()
        .map(|spec| spec.connection_settings())
        .filter(|settings| seen.insert(settings.key()))
        .collect()
}
