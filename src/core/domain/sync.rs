//! Sync results.

use std::fmt;

use serde::Serialize;

use crate::core::types::{Revision, Slug};

/// A merge decision the user should know about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conflict {
    /// Both sides edited the same profile; the newer edit was kept.
    ConcurrentEdit {
        slug: Slug,
        kept: Revision,
        discarded: Revision,
    },
    /// Deleted here, edited on the remote; the remote edit was restored.
    RestoredRemoteEdit { slug: Slug },
    /// Deleted on the remote, edited here; the local edit was kept.
    KeptLocalEdit { slug: Slug },
}

impl Conflict {
    pub fn slug(&self) -> &str {
        match self {
            Conflict::ConcurrentEdit { slug, .. }
            | Conflict::RestoredRemoteEdit { slug }
            | Conflict::KeptLocalEdit { slug } => slug,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::ConcurrentEdit {
                slug,
                kept,
                discarded,
            } => write!(
                f,
                "{}: edited on both sides, kept revision {} over {}",
                slug, kept, discarded
            ),
            Conflict::RestoredRemoteEdit { slug } => {
                write!(f, "{}: deleted locally but edited remotely, restored", slug)
            }
            Conflict::KeptLocalEdit { slug } => {
                write!(f, "{}: deleted remotely but edited locally, kept", slug)
            }
        }
    }
}

/// Outcome of a pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Profiles that appeared locally.
    pub added: Vec<Slug>,
    /// Local profiles replaced by the remote version.
    pub updated: Vec<Slug>,
    /// Local profiles removed because the remote deleted them.
    pub removed: Vec<Slug>,
    pub conflicts: Vec<Conflict>,
}

impl MergeReport {
    /// Whether the pull changed nothing locally.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.updated.is_empty()
            && self.removed.is_empty()
            && self.conflicts.is_empty()
    }
}

/// Outcome of a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushReport {
    /// Whether local changes produced a new commit.
    pub committed: bool,
    /// Commit that was pushed.
    pub head: String,
}
