//! `conform run`: one full pass, then housekeeping.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};
use tokio_util::sync::CancellationToken;

use conform_p4::P4Connector;
use conform_sync::{pipeline, ConformContext, ConformReport};

use super::ManifestArgs;

/// Arguments for `conform run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Emit the pass report as JSON.
    #[arg(long)]
    pub json: bool,

    /// `p4` executable to drive.
    #[arg(long, default_value = "p4")]
    pub p4: PathBuf,
}

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "metadata dir")]
    metadata_dir: String,
    #[tabled(rename = "strategy")]
    strategy: String,
    #[tabled(rename = "clients")]
    clients: String,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let manifest = self.manifest.load()?;
        let connector = P4Connector::new(&self.p4);

        let report = super::runtime()?.block_on(async {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("received ctrl-c, stopping after the current call");
                    on_signal.cancel();
                }
            });

            let span = tracing::info_span!("conform", root = %manifest.root_dir.display());
            let ctx = ConformContext::new(span, cancel);
            pipeline::run(&manifest, &connector, &ctx).await
        });
        let report = report.context("conform pass failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
            return Ok(());
        }
        print_summary(&report);
        Ok(())
    }
}

fn print_summary(report: &ConformReport) {
    let elapsed = report.finished_at - report.started_at;
    println!(
        "{} {} workspaces conformed in {}s",
        "✓".green(),
        report.workspaces.len(),
        elapsed.num_seconds()
    );
    for client in &report.deleted_clients {
        println!("  {} client {client}", "deleted".red());
    }
    for path in report.deleted_dirs.iter().chain(&report.deleted_files) {
        println!("  {} {}", "deleted".red(), path.display());
    }

    if report.groups.is_empty() {
        return;
    }
    let rows: Vec<GroupRow> = report
        .groups
        .iter()
        .map(|g| GroupRow {
            metadata_dir: g.metadata_dir.display().to_string(),
            strategy: g.strategy.to_string(),
            clients: g.clients.join("\n"),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
