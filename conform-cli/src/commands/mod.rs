pub mod clients;
pub mod plan;
pub mod run;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use conform_core::{manifest, Manifest};

/// Where the desired-workspace list comes from, shared by every command.
#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Manifest file (default: ~/.conform/workspaces.yaml).
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Override the manifest's agent root directory.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Remove untracked files in every workspace for this pass.
    #[arg(long)]
    pub remove_untracked: bool,
}

impl ManifestArgs {
    pub fn load(&self) -> Result<Manifest> {
        let mut loaded = match &self.manifest {
            Some(path) => manifest::load_from(path)
                .with_context(|| format!("failed to load manifest {}", path.display()))?,
            None => manifest::load().context("failed to load manifest")?,
        };
        if let Some(root) = &self.root {
            if !root.is_absolute() {
                bail!("--root must be an absolute path, got '{}'", root.display());
            }
            loaded.root_dir = root.clone();
        }
        loaded.remove_untracked_files |= self.remove_untracked;
        Ok(loaded)
    }
}

/// Multi-thread runtime for the async commands.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
