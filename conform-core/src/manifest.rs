//! Desired-workspace manifest.
//!
//! # Storage layout
//!
//! ```text
//! ~/.conform/
//!   workspaces.yaml       (mode 0600)
//! ```
//!
//! The manifest is one way of delivering the desired-workspace list; the
//! reconciler itself only ever sees `&[WorkspaceSpec]`.
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use crate::error::ManifestError;
use crate::types::Manifest;

/// `<home>/.conform/workspaces.yaml`. Pure, no I/O.
pub fn manifest_path_at(home: &Path) -> PathBuf {
    home.join(".conform").join("workspaces.yaml")
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load and validate a manifest from an explicit file path.
///
/// Returns `ManifestError::NotFound` if absent, `ManifestError::Parse`
/// (with path + line context) if malformed YAML, and
/// `ManifestError::Invalid` if `root_dir` is not absolute.
pub fn load_from(path: &Path) -> Result<Manifest, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let manifest: Manifest =
        serde_yaml::from_str(&contents).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
    validate(path, &manifest)?;
    Ok(manifest)
}

/// Load `<home>/.conform/workspaces.yaml`.
pub fn load_at(home: &Path) -> Result<Manifest, ManifestError> {
    load_from(&manifest_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Manifest, ManifestError> {
    load_at(&home()?)
}

fn validate(path: &Path, manifest: &Manifest) -> Result<(), ManifestError> {
    if !manifest.root_dir.is_absolute() {
        return Err(ManifestError::Invalid {
            path: path.to_path_buf(),
            reason: format!(
                "root_dir must be absolute, got '{}'",
                manifest.root_dir.display()
            ),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a manifest to `<home>/.conform/workspaces.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, manifest: &Manifest) -> Result<PathBuf, ManifestError> {
    let path = manifest_path_at(home);
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            set_dir_permissions(dir)?;
        }
    }
    let tmp_path = path.with_file_name("workspaces.yaml.tmp");

    let yaml = serde_yaml::to_string(manifest)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(manifest: &Manifest) -> Result<PathBuf, ManifestError> {
    save_at(&home()?, manifest)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ManifestError> {
    dirs::home_dir().ok_or(ManifestError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ManifestError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ManifestError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ManifestError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ManifestError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
