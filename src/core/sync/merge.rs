//! Three-way merge of vault indexes.
//!
//! Works on revisions only, never on secrets: each side's index is compared
//! with the index at the common ancestor, slug by slug. The result says which
//! side's record to keep for every slug, plus what the user should be told.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::core::domain::{Conflict, MergeReport, ProfileMeta};
use crate::core::types::Slug;
use crate::core::vault::Index;

/// Which record survives for a slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    Local,
    Remote,
    /// Deleted by the remote, untouched here.
    Drop,
}

/// Merge decisions for every slug seen on either side.
#[derive(Debug, Default)]
pub struct MergePlan {
    pub picks: BTreeMap<Slug, Pick>,
    pub report: MergeReport,
}

impl MergePlan {
    /// The merged index: local metadata for `Local`, remote for `Remote`.
    pub fn merged(&self, local: &Index, remote: &Index) -> Index {
        let mut merged = Index::default();
        for (slug, pick) in &self.picks {
            let meta = match pick {
                Pick::Local => local.get(slug),
                Pick::Remote => remote.get(slug),
                Pick::Drop => None,
            };
            if let Some(meta) = meta {
                merged.profiles.insert(slug.clone(), meta.clone());
            }
        }
        merged
    }

    /// Slugs whose record must be copied from the remote.
    pub fn incoming(&self) -> impl Iterator<Item = &Slug> {
        self.picks
            .iter()
            .filter(|(_, pick)| **pick == Pick::Remote)
            .map(|(slug, _)| slug)
    }
}

/// Plan the merge of `remote` into `local`, given their common ancestor.
///
/// Pass an empty `base` for unrelated histories. For each slug:
///
/// - unchanged on the remote since `base`: keep local
/// - unchanged locally since `base`: take the remote change, including a
///   deletion
/// - changed on both sides: the later edit wins and the clash is reported;
///   if one side deleted, the edit is kept over the deletion
pub fn plan(base: &Index, local: &Index, remote: &Index) -> MergePlan {
    let slugs: BTreeSet<&Slug> = base
        .profiles
        .keys()
        .chain(local.profiles.keys())
        .chain(remote.profiles.keys())
        .collect();

    let mut plan = MergePlan::default();
    for slug in slugs {
        let b = base.get(slug);
        let l = local.get(slug);
        let r = remote.get(slug);

        let pick = if same(l, r) || same(r, b) {
            Pick::Local
        } else if same(l, b) {
            match r {
                Some(_) if l.is_some() => {
                    plan.report.updated.push(slug.clone());
                    Pick::Remote
                }
                Some(_) => {
                    plan.report.added.push(slug.clone());
                    Pick::Remote
                }
                None => {
                    plan.report.removed.push(slug.clone());
                    Pick::Drop
                }
            }
        } else {
            let (pick, conflict) = resolve(slug, l, r);
            warn!(%conflict, "sync conflict");
            plan.report.conflicts.push(conflict);
            pick
        };
        plan.picks.insert(slug.clone(), pick);
    }
    plan
}

/// Both sides changed `slug` since the common ancestor.
fn resolve(slug: &str, local: Option<&ProfileMeta>, remote: Option<&ProfileMeta>) -> (Pick, Conflict) {
    let slug = slug.to_string();
    match (local, remote) {
        (Some(l), Some(r)) if r.supersedes(l) => (
            Pick::Remote,
            Conflict::ConcurrentEdit {
                slug,
                kept: r.revision.clone(),
                discarded: l.revision.clone(),
            },
        ),
        (Some(l), Some(r)) => (
            Pick::Local,
            Conflict::ConcurrentEdit {
                slug,
                kept: l.revision.clone(),
                discarded: r.revision.clone(),
            },
        ),
        (None, _) => (Pick::Remote, Conflict::RestoredRemoteEdit { slug }),
        (Some(_), None) => (Pick::Local, Conflict::KeptLocalEdit { slug }),
    }
}

fn same(a: Option<&ProfileMeta>, b: Option<&ProfileMeta>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.revision == b.revision,
        (None, None) => true,
        _ => false,
    }
}
