//! Force-delete primitives for files and directories.
//!
//! Build tools routinely leave read-only files behind (and on unix, read-only
//! directories, which make their entries undeletable). Each primitive first
//! tries a plain removal; on failure it clears the read-only state of the
//! whole subtree and retries once, so the second error is the one reported.

use std::fs;
use std::io;
use std::path::Path;

/// Delete a single file, clearing its read-only attribute if needed.
///
/// A file that is already gone counts as deleted.
pub fn force_delete_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(first) => {
            tracing::debug!(path = %path.display(), error = %first, "retrying file delete as writable");
            make_writable(path)?;
            if let Some(parent) = path.parent() {
                make_dir_writable(parent)?;
            }
            fs::remove_file(path)
        }
    }
}

/// Delete a directory and everything below it.
///
/// A directory that is already gone counts as deleted. Symlinks inside the
/// tree are removed, never followed.
pub fn force_delete_dir(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(first) => {
            tracing::debug!(path = %path.display(), error = %first, "retrying directory delete as writable");
            make_tree_writable(path)?;
            fs::remove_dir_all(path)
        }
    }
}

/// Delete everything inside `path`, keeping `path` itself.
pub fn force_delete_dir_contents(path: &Path) -> io::Result<()> {
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        if entry.file_type()?.is_dir() {
            force_delete_dir(&entry_path)?;
        } else {
            force_delete_file(&entry_path)?;
        }
    }
    Ok(())
}

fn make_tree_writable(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }
    if meta.is_dir() {
        make_dir_writable(path)?;
        for entry in fs::read_dir(path)? {
            make_tree_writable(&entry?.path())?;
        }
    } else {
        make_writable(path)?;
    }
    Ok(())
}

fn make_writable(path: &Path) -> io::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if meta.file_type().is_symlink() {
        return Ok(());
    }
    let mut perms = meta.permissions();
    if perms.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

#[cfg(unix)]
fn make_dir_writable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)?.permissions().mode();
    if mode & 0o700 != 0o700 {
        fs::set_permissions(path, fs::Permissions::from_mode(mode | 0o700))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_dir_writable(path: &Path) -> io::Result<()> {
    make_writable(path)
}
