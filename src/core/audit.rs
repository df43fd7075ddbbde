//! Audit log.
//!
//! Append-only JSON lines, one file per vault, kept outside the vault
//! directories so they are never synced. Each entry is written with a single
//! `write_all` on an `O_APPEND` handle, so concurrent writers never
//! interleave within a line.

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::iter::Peekable;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::domain::{AuditEntry, AuditFilter};
use crate::core::store;
use crate::error::{AuditError, Result};

/// Audit log of one vault.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and flush it to disk.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::WriteFailed` if the log cannot be opened or
    /// written. Callers decide whether that is fatal.
    pub fn record(&self, entry: &AuditEntry) -> std::result::Result<(), AuditError> {
        let failed = |source: std::io::Error| AuditError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent() {
            if !dir.exists() {
                store::ensure_private_dir(dir)
                    .map_err(|e| failed(std::io::Error::other(e.to_string())))?;
            }
        }

        let mut line = serde_json::to_vec(entry).map_err(|e| failed(e.into()))?;
        line.push(b'\n');

        let mut file = open_append(&self.path).map_err(failed)?;
        file.write_all(&line).map_err(failed)?;
        file.sync_data().map_err(failed)?;

        debug!(slug = %entry.slug, action = %entry.action, exposed = entry.exposed, "audit entry recorded");
        Ok(())
    }

    /// Entries matching `filter`, newest first.
    ///
    /// The file is read backwards in fixed-size blocks, so memory use is
    /// bounded by the longest line rather than the log size. Lines that do
    /// not parse (a torn final write) are skipped with a warning.
    pub fn query(&self, filter: &AuditFilter) -> Result<impl Iterator<Item = AuditEntry>> {
        let read_failed = |source: std::io::Error| AuditError::ReadFailed {
            path: self.path.clone(),
            source,
        };
        let lines = match fs::File::open(&self.path) {
            Ok(file) => {
                let len = file.metadata().map_err(read_failed)?.len();
                RevLines::new(file, len, self.path.clone())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RevLines::empty(self.path.clone()),
            Err(source) => return Err(read_failed(source).into()),
        };

        let filter = filter.clone();
        let path = self.path.clone();
        let limit = filter.limit.unwrap_or(usize::MAX);

        Ok(lines
            .filter_map(move |line| match serde_json::from_str::<AuditEntry>(&line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable audit line");
                    None
                }
            })
            .filter(move |entry| filter.matches(entry))
            .take(limit))
    }
}

const BLOCK_SIZE: u64 = 8 * 1024;

/// Non-blank lines of a file, last line first.
struct RevLines {
    file: Option<fs::File>,
    /// Bytes before this offset have not been read yet.
    unread: u64,
    /// Read bytes not yet returned; always the start of a partial line.
    pending: Vec<u8>,
    path: PathBuf,
}

impl RevLines {
    fn new(file: fs::File, len: u64, path: PathBuf) -> Self {
        Self {
            file: Some(file),
            unread: len,
            pending: Vec::new(),
            path,
        }
    }

    fn empty(path: PathBuf) -> Self {
        Self {
            file: None,
            unread: 0,
            pending: Vec::new(),
            path,
        }
    }

    /// Prepend the block just before `unread` to `pending`.
    fn read_block(&mut self) -> std::io::Result<()> {
        let Some(file) = self.file.as_mut() else {
            self.unread = 0;
            return Ok(());
        };
        let step = BLOCK_SIZE.min(self.unread);
        let start = self.unread - step;
        let mut block = vec![0u8; step as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut block)?;
        block.extend_from_slice(&self.pending);
        self.pending = block;
        self.unread = start;
        Ok(())
    }
}

impl Iterator for RevLines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let line = if let Some(newline) = self.pending.iter().rposition(|&b| b == b'\n') {
                let line = self.pending.split_off(newline + 1);
                self.pending.truncate(newline);
                line
            } else if self.unread > 0 {
                if let Err(e) = self.read_block() {
                    warn!(path = %self.path.display(), error = %e, "audit log read failed");
                    self.unread = 0;
                    self.pending.clear();
                }
                continue;
            } else if !self.pending.is_empty() {
                std::mem::take(&mut self.pending)
            } else {
                return None;
            };

            let line = String::from_utf8_lossy(&line);
            if !line.trim().is_empty() {
                return Some(line.into_owned());
            }
        }
    }
}

#[cfg(unix)]
fn open_append(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(store::FILE_MODE)
        .open(path)
}

#[cfg(not(unix))]
fn open_append(path: &Path) -> std::io::Result<fs::File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Merge several newest-first streams into one newest-first stream.
pub fn newest_first<I>(sources: Vec<I>) -> NewestFirst<I>
where
    I: Iterator<Item = AuditEntry>,
{
    NewestFirst {
        sources: sources.into_iter().map(Iterator::peekable).collect(),
    }
}

/// Iterator returned by [`newest_first`].
pub struct NewestFirst<I: Iterator<Item = AuditEntry>> {
    sources: Vec<Peekable<I>>,
}

impl<I: Iterator<Item = AuditEntry>> Iterator for NewestFirst<I> {
    type Item = AuditEntry;

    fn next(&mut self) -> Option<AuditEntry> {
        let mut newest: Option<usize> = None;
        for i in 0..self.sources.len() {
            let Some(candidate) = self.sources[i].peek().map(|e| e.timestamp) else {
                continue;
            };
            let is_newer = match newest {
                None => true,
                Some(j) => self.sources[j]
                    .peek()
                    .map_or(true, |best| candidate > best.timestamp),
            };
            if is_newer {
                newest = Some(i);
            }
        }
        newest.and_then(|i| self.sources[i].next())
    }
}
