//! Advisory vault lock.
//!
//! Writers serialize on an exclusive `flock` of `<vault>/.lock`. Acquisition
//! polls with exponential backoff and gives up after the configured timeout.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, trace};

use crate::core::constants::LOCK_FILE;
use crate::error::{Result, VaultError};

const INITIAL_BACKOFF: Duration = Duration::from_millis(5);
const MAX_BACKOFF: Duration = Duration::from_millis(200);

/// An exclusive lock on a vault directory, released on drop.
#[derive(Debug)]
pub struct VaultLock {
    file: File,
    path: PathBuf,
}

impl VaultLock {
    /// Acquire the lock for `dir`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Locked` if another process still holds the lock
    /// when the timeout expires.
    pub fn acquire(dir: &Path, timeout: Duration) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        let file = open_lock_file(&path)?;

        let start = Instant::now();
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %path.display(), waited_ms = start.elapsed().as_millis() as u64, "acquired vault lock");
                    return Ok(Self { file, path });
                }
                Err(e) if is_contended(&e) => {
                    let waited = start.elapsed();
                    if waited >= timeout {
                        return Err(VaultError::Locked {
                            path,
                            waited_ms: waited.as_millis() as u64,
                        }
                        .into());
                    }
                    trace!(path = %path.display(), backoff_ms = backoff.as_millis() as u64, "vault lock busy");
                    thread::sleep(backoff.min(timeout - waited));
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        trace!(path = %self.path.display(), "released vault lock");
    }
}

#[cfg(unix)]
fn open_lock_file(path: &Path) -> Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o600)
        .open(path)?)
}

#[cfg(not(unix))]
fn open_lock_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
