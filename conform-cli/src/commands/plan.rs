//! `conform plan`: offline preview of a pass.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use conform_sync::{plan_pass, PassPlan};

use super::ManifestArgs;

/// Arguments for `conform plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Host name to build client names with (default: this machine's).
    #[arg(long)]
    pub host: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "identifier")]
    identifier: String,
    #[tabled(rename = "client")]
    client: String,
    #[tabled(rename = "stream")]
    stream: String,
    #[tabled(rename = "workspace dir")]
    workspace_dir: String,
    #[tabled(rename = "strategy")]
    strategy: String,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let manifest = self.manifest.load()?;
        let host = self.host.unwrap_or_else(local_host);
        let plan = plan_pass(
            &manifest.workspaces,
            &manifest.root_dir,
            manifest.remove_untracked_files,
            &host,
        )
        .context("failed to plan pass")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("failed to serialize plan JSON")?
            );
            return Ok(());
        }
        print_plan(&plan);
        Ok(())
    }
}

fn local_host() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "localhost".to_string())
}

fn print_plan(plan: &PassPlan) {
    println!(
        "Conform v{} | root {} | host {} | {} workspaces | {} groups",
        env!("CARGO_PKG_VERSION"),
        plan.root_dir.display(),
        plan.host,
        plan.workspaces.len(),
        plan.groups.len(),
    );
    if plan.workspaces.is_empty() {
        println!("No workspaces assigned; every directory under the root except the protected ones would be removed.");
    } else {
        let rows: Vec<PlanRow> = plan
            .groups
            .iter()
            .flat_map(|group| {
                group.members.iter().map(move |member| PlanRow {
                    identifier: member.identifier.clone(),
                    client: member.client_name.clone(),
                    stream: member.stream.clone(),
                    workspace_dir: member.workspace_dir.display().to_string(),
                    strategy: group.strategy.to_string(),
                })
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    println!("{}", "Protected directories:".bold());
    for dir in &plan.protected_dirs {
        println!("  {}", dir.display());
    }
}
