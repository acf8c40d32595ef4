//! Lexical path helpers shared by the materializer, the fleet scanner and the
//! stray-directory cleanup.
//!
//! Nothing here touches the filesystem: client roots reported by the backend
//! describe paths that may not exist locally, and symlink resolution would
//! make containment depend on disk state.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Name of the workspace checkout directory inside a metadata directory.
pub const SYNC_DIR_NAME: &str = "Sync";

/// Directories directly under the agent root that survive stray-cleanup
/// unless the pass removes untracked files.
pub const TEMP_DIR_NAME: &str = "Temp";
pub const SAVED_DIR_NAME: &str = "Saved";

/// Lexically normalize an absolute path: drop `.` components and fold `..`
/// into their parent.
///
/// Returns `None` for relative paths and for paths whose `..` components
/// climb above the filesystem root.
pub fn normalize(path: &Path) -> Option<PathBuf> {
    if !path.is_absolute() {
        return None;
    }
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(name) => {
                out.push(name);
                depth += 1;
            }
        }
    }
    Some(out)
}

/// `true` iff `path` is a strict descendant of `dir` after normalizing both.
///
/// Component comparison is case-insensitive on Windows and exact elsewhere,
/// matching how each platform resolves directory names.
pub fn is_under_dir(path: &Path, dir: &Path) -> bool {
    let (Some(path), Some(dir)) = (normalize(path), normalize(dir)) else {
        return false;
    };
    let mut child = path.components();
    for parent in dir.components() {
        match child.next() {
            Some(c) if component_eq(c.as_os_str(), parent.as_os_str()) => {}
            _ => return false,
        }
    }
    child.next().is_some()
}

/// `true` iff both paths normalize to the same location.
pub fn same_dir(a: &Path, b: &Path) -> bool {
    match (normalize(a), normalize(b)) {
        (Some(a), Some(b)) => {
            let (mut a, mut b) = (a.components(), b.components());
            loop {
                match (a.next(), b.next()) {
                    (None, None) => return true,
                    (Some(x), Some(y)) if component_eq(x.as_os_str(), y.as_os_str()) => {}
                    _ => return false,
                }
            }
        }
        _ => false,
    }
}

/// `true` iff `name` is usable as exactly one directory name under a root.
pub fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(windows)]
fn component_eq(a: &OsStr, b: &OsStr) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

#[cfg(not(windows))]
fn component_eq(a: &OsStr, b: &OsStr) -> bool {
    a == b
}
