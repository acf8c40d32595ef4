//! `conform clients`: read-only fleet classification.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use conform_p4::P4Connector;
use conform_sync::{pipeline, ClientVerdict, ConformContext, FleetScan};

use super::ManifestArgs;

/// Arguments for `conform clients`.
#[derive(Args, Debug)]
pub struct ClientsArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// `p4` executable to drive.
    #[arg(long, default_value = "p4")]
    pub p4: PathBuf,
}

#[derive(Serialize)]
struct ClientJson {
    server: String,
    client: String,
    host: String,
    root: String,
    verdict: ClientVerdict,
}

#[derive(Tabled)]
struct ClientRow {
    #[tabled(rename = "client")]
    client: String,
    #[tabled(rename = "host")]
    host: String,
    #[tabled(rename = "root")]
    root: String,
    #[tabled(rename = "verdict")]
    verdict: String,
}

impl ClientsArgs {
    pub fn run(self) -> Result<()> {
        let manifest = self.manifest.load()?;
        let connector = P4Connector::new(&self.p4);
        let scans = super::runtime()?
            .block_on(pipeline::inspect_fleet(
                &manifest,
                &connector,
                &ConformContext::detached(),
            ))
            .context("failed to inspect clients")?;

        if self.json {
            let rows: Vec<ClientJson> = scans
                .iter()
                .flat_map(|scan| {
                    let server = scan.info.server_id.clone().unwrap_or_default();
                    scan.clients.iter().map(move |c| ClientJson {
                        server: server.clone(),
                        client: c.client.name.clone(),
                        host: c.client.host.clone(),
                        root: c.client.root.clone(),
                        verdict: c.verdict,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize clients JSON")?
            );
            return Ok(());
        }

        for scan in &scans {
            print_scan(scan);
        }
        Ok(())
    }
}

fn print_scan(scan: &FleetScan) {
    let server = scan.info.server_id.as_deref().unwrap_or("(no server id)");
    println!("{} {} as seen from {}", "■".bright_black(), server.bold(), scan.info.local_host);
    if scan.clients.is_empty() {
        println!("No clients.");
        return;
    }
    let rows: Vec<ClientRow> = scan
        .clients
        .iter()
        .map(|c| ClientRow {
            client: c.client.name.clone(),
            host: c.client.host.clone(),
            root: c.client.root.clone(),
            verdict: verdict_label(c.verdict),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let orphans = scan.orphans().count();
    if orphans > 0 {
        println!("{orphans} orphaned client(s); `conform run` would delete them.");
    }
}

fn verdict_label(verdict: ClientVerdict) -> String {
    match verdict {
        ClientVerdict::Orphan => verdict.to_string().red().to_string(),
        ClientVerdict::Kept => verdict.to_string().green().to_string(),
        _ => verdict.to_string().bright_black().to_string(),
    }
}
