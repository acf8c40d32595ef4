//! Conform: workspace fleet reconciliation for build agents.
//!
//! # Usage
//!
//! ```text
//! conform run     [--manifest <file>] [--root <dir>] [--remove-untracked] [--json] [--p4 <program>]
//! conform plan    [--manifest <file>] [--root <dir>] [--remove-untracked] [--host <name>] [--json]
//! conform clients [--manifest <file>] [--root <dir>] [--json] [--p4 <program>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{clients::ClientsArgs, plan::PlanArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "conform",
    version,
    about = "Bring a build agent's workspaces in line with its assigned list",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a full conform pass against the Perforce server.
    Run(RunArgs),

    /// Show the layout, groups and protected directories a pass would use,
    /// without contacting a server.
    Plan(PlanArgs),

    /// List every client the agent's connections can see, with its verdict.
    Clients(ClientsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Plan(args) => args.run(),
        Commands::Clients(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
