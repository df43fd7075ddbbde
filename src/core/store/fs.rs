//! Filesystem primitives for vault storage.
//!
//! Every persistent write goes through [`write_atomic`]: the payload lands in
//! a temp file in the target directory, is fsynced, and is renamed over the
//! destination. Readers see either the old file or the new one.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::constants::TMP_EXT;
use crate::core::crypto::random_hex;
use crate::error::{ConfigError, Result};

/// Mode for vault directories.
pub const DIR_MODE: u32 = 0o700;

/// Mode for vault files.
pub const FILE_MODE: u32 = 0o600;

/// Create `path` (and parents) with owner-only permissions.
pub fn ensure_private_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        debug!(path = %path.display(), "created directory");
    }
    restrict(path, DIR_MODE)?;
    Ok(())
}

/// Set owner-only permissions on an existing path.
#[cfg(unix)]
pub fn restrict(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    verify_mode(path, mode)
}

#[cfg(not(unix))]
pub fn restrict(path: &Path, _mode: u32) -> Result<()> {
    verify_mode(path, _mode)
}

/// Verify `path` has exactly `expected` permission bits.
///
/// # Errors
///
/// Returns `ConfigError::InsecurePermissions` if the mode differs. Platforms
/// without POSIX modes cannot express the guarantee and always fail.
#[cfg(unix)]
pub fn verify_mode(path: &Path, expected: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let actual = fs::metadata(path)?.permissions().mode() & 0o777;
    if actual != expected {
        return Err(ConfigError::InsecurePermissions {
            path: path.to_path_buf(),
            mode: format!("{:o} (expected {:o})", actual, expected),
        }
        .into());
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn verify_mode(path: &Path, _expected: u32) -> Result<()> {
    Err(ConfigError::InsecurePermissions {
        path: path.to_path_buf(),
        mode: "unsupported on this platform".to_string(),
    }
    .into())
}

/// Atomically replace `path` with `contents`, mode 0600.
///
/// The temp file is removed if any step before the rename fails.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{}.{}.{}", name, random_hex(6), TMP_EXT));

    let result = write_then_rename(&tmp, path, contents);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result?;

    sync_dir(dir);
    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

fn write_then_rename(tmp: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = create_private(tmp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    restrict(tmp, FILE_MODE)?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(FILE_MODE)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Best-effort fsync of a directory so a rename survives power loss.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// Read a file, returning `None` if it does not exist.
pub fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Remove a file, ignoring one that is already gone.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Tighten permissions on a vault tree written by an external tool.
///
/// Directories become 0700 and regular files 0600. The `.git` directory is
/// closed off but not descended into.
pub fn secure_tree(root: &Path) -> Result<()> {
    restrict(root, DIR_MODE)?;
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let kind = entry.file_type()?;
            if kind.is_dir() {
                restrict(&path, DIR_MODE)?;
                if entry.file_name() != ".git" {
                    pending.push(path);
                }
            } else if kind.is_file() {
                restrict(&path, FILE_MODE)?;
            }
        }
    }
    Ok(())
}
