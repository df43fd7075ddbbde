//! Sync engine.
//!
//! A vault directory doubles as a git working tree. Push commits the current
//! state and pushes it; pull fetches, then merges profile by profile against
//! the common ancestor (see [`merge::plan`]) and commits the result. Records
//! coming from a remote sealed under a different content key are
//! re-encrypted under the local one before they are written.
//!
//! Team vaults are created and joined here too. Their content key is wrapped
//! under the team master key, which members exchange out of band.

mod git;
mod merge;

use std::fs;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};

pub use git::Git;
pub use merge::{plan, MergePlan, Pick};

use crate::core::constants::{HEADER_FILE, INDEX_FILE, PROFILES_DIR};
use crate::core::crypto::{self, KdfParams, Key, SecretMaterial};
use crate::core::domain::{MergeReport, PushReport};
use crate::core::store;
use crate::core::validation::validate_team_name;
use crate::core::vault::{Index, Vault, VaultHeader};
use crate::error::{ConfigError, Error, Result, SyncError, VaultError};

/// Make `vault` a git working tree pushing to `url`.
///
/// Safe to repeat: an existing repository keeps its history and only the
/// remote URL is updated.
pub fn init(vault: &Vault, url: &str, branch: &str) -> Result<()> {
    let git = Git::new(vault.dir())?;
    if !git.is_repo() {
        git.init(branch)?;
        info!(vault = %vault.name(), "initialized git repository");
    }
    git.set_remote(url)?;
    git.write_ignore()?;
    store::secure_tree(vault.dir())?;
    info!(vault = %vault.name(), remote = %url, "sync configured");
    Ok(())
}

/// Remote URL of `vault`, if sync is configured.
pub fn remote(vault: &Vault) -> Result<Option<String>> {
    let git = Git::new(vault.dir())?;
    if !git.is_repo() {
        return Ok(None);
    }
    git.remote_url()
}

/// Commit local changes and push them.
///
/// # Errors
///
/// - `SyncError::NotConfigured` if [`init`] was never run for this vault
/// - `SyncError::Diverged` if the remote has changes that must be pulled first
pub fn push(vault: &mut Vault, branch: &str) -> Result<PushReport> {
    let git = configured(vault)?;
    let committed = vault.with_lock(|vault| {
        recover_interrupted_merge(&git, vault)?;
        git.commit_all(&commit_message(vault, "push"))
    })?;
    let head = git.head()?.ok_or_else(|| SyncError::Git {
        command: "push".to_string(),
        stderr: "nothing to push".to_string(),
    })?;

    git.push(branch)?;
    info!(vault = %vault.name(), head = %short(&head), committed, "pushed");
    Ok(PushReport { committed, head })
}

/// Fetch the remote and merge it into `vault`.
///
/// `secret` is the vault's master key. It is needed when the remote holds
/// records sealed under a different content key.
pub fn pull(vault: &mut Vault, secret: &SecretMaterial, branch: &str) -> Result<MergeReport> {
    let git = configured(vault)?;
    let Some(theirs) = git.fetch(branch)? else {
        debug!(vault = %vault.name(), "remote branch is empty");
        return Ok(MergeReport::default());
    };

    let report = vault.with_lock(|vault| {
        recover_interrupted_merge(&git, vault)?;
        git.commit_all(&commit_message(vault, "pull"))?;
        let ours = git.head()?;

        let report = match ours {
            Some(ref ours) if git.is_ancestor(&theirs, ours)? => {
                debug!(vault = %vault.name(), "already up to date");
                MergeReport::default()
            }
            Some(ref ours) if !git.is_ancestor(ours, &theirs)? => {
                let base = git.merge_base(ours, &theirs)?;
                merge_diverged(&git, vault, secret, base.as_deref(), &theirs)?
            }
            _ => fast_forward(&git, vault, secret, &theirs)?,
        };
        vault.prune()?;
        Ok(report)
    })?;

    for conflict in &report.conflicts {
        warn!(vault = %vault.name(), %conflict, "merge conflict resolved");
    }
    info!(
        vault = %vault.name(),
        added = report.added.len(),
        updated = report.updated.len(),
        removed = report.removed.len(),
        conflicts = report.conflicts.len(),
        "pulled"
    );
    Ok(report)
}

/// Create a team vault in `dir` and publish it to `url`.
///
/// # Errors
///
/// Returns `SyncError::TeamExists` if `dir` is already in use. A failed
/// publish removes the local copy again.
pub fn create_team(
    dir: &Path,
    name: &str,
    url: &str,
    master: &SecretMaterial,
    params: &KdfParams,
    branch: &str,
) -> Result<Vault> {
    validate_team_name(name)?;
    if dir.exists() {
        return Err(SyncError::TeamExists(name.to_string()).into());
    }
    let git = Git::new(dir)?;

    let publish = || -> Result<Vault> {
        let vault = Vault::init(dir, name, master, params)?;
        init(&vault, url, branch)?;
        git.commit_all(&commit_message(&vault, "create"))?;
        git.push(branch)?;
        Ok(vault)
    };
    match publish() {
        Ok(vault) => {
            info!(team = %name, remote = %url, "team vault created");
            Ok(vault)
        }
        Err(e) => {
            discard_clone(dir);
            Err(e)
        }
    }
}

/// Clone the team vault at `url` into `dir` and unlock it with `master`.
///
/// # Errors
///
/// - `SyncError::TeamExists` if `dir` is already in use
/// - `SyncError::InvalidMasterKey` if `master` does not unlock the vault
/// - `SyncError::NotAVault` if the remote holds no vault
///
/// On any error the clone is removed.
pub fn join_team(
    dir: &Path,
    name: &str,
    url: &str,
    master: &SecretMaterial,
    branch: &str,
) -> Result<Vault> {
    validate_team_name(name)?;
    if dir.exists() {
        return Err(SyncError::TeamExists(name.to_string()).into());
    }
    if let Some(parent) = dir.parent() {
        store::ensure_private_dir(parent)?;
    }

    Git::clone(url, dir, branch)?;
    let opened = store::secure_tree(dir).and_then(|_| Vault::open(dir, name, master));
    match opened {
        Ok(vault) => {
            info!(team = %name, profiles = vault.len(), "joined team vault");
            Ok(vault)
        }
        Err(e) => {
            discard_clone(dir);
            Err(match e {
                Error::Vault(VaultError::WrongKey { .. }) => SyncError::InvalidMasterKey {
                    team: name.to_string(),
                }
                .into(),
                Error::Config(ConfigError::NotInitialized { .. }) => SyncError::NotAVault {
                    team: name.to_string(),
                }
                .into(),
                other => other,
            })
        }
    }
}

/// Delete the local copy of a team vault.
pub fn leave_team(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

fn configured(vault: &Vault) -> Result<Git> {
    let git = Git::new(vault.dir())?;
    if !git.is_repo() || git.remote_url()?.is_none() {
        return Err(SyncError::NotConfigured(vault.name().to_string()).into());
    }
    Ok(git)
}

/// Drop a merge left behind by an interrupted pull.
///
/// Committing over it would record the remote tip as merged with only our
/// side in the tree. The index file is replaced atomically, so the tree is
/// consistent once the merge is gone; orphaned blobs are pruned.
fn recover_interrupted_merge(git: &Git, vault: &mut Vault) -> Result<()> {
    if !git.merge_in_progress()? {
        return Ok(());
    }
    warn!(vault = %vault.name(), "abandoning merge left by an interrupted pull");
    git.abort_merge()?;
    store::secure_tree(vault.dir())?;
    vault.reload()?;
    vault.prune()?;
    Ok(())
}

/// The remote only added commits on top of ours.
fn fast_forward(
    git: &Git,
    vault: &mut Vault,
    secret: &SecretMaterial,
    theirs: &str,
) -> Result<MergeReport> {
    let remote = Snapshot::at(git, theirs, vault, secret)?
        .ok_or_else(|| SyncError::NotAVault {
            team: vault.name().to_string(),
        })?;
    let report = plan(vault.index(), vault.index(), &remote.index).report;

    git.fast_forward(theirs)?;
    store::secure_tree(vault.dir())?;
    if remote.key.same_as(vault.key()) {
        vault.reload()?;
    } else {
        let timeout = vault.lock_timeout();
        *vault = Vault::open(vault.dir(), vault.name(), secret)?.with_lock_timeout(timeout);
    }
    debug!(vault = %vault.name(), head = %short(theirs), "fast-forwarded");
    Ok(report)
}

/// Both sides have commits the other lacks.
fn merge_diverged(
    git: &Git,
    vault: &mut Vault,
    secret: &SecretMaterial,
    base: Option<&str>,
    theirs: &str,
) -> Result<MergeReport> {
    let remote = Snapshot::at(git, theirs, vault, secret)?.ok_or_else(|| SyncError::NotAVault {
        team: vault.name().to_string(),
    })?;
    let base_index = match base {
        Some(base) => Snapshot::at(git, base, vault, secret)?
            .map(|snapshot| snapshot.index)
            .unwrap_or_default(),
        None => Index::default(),
    };
    let plan = plan(&base_index, vault.index(), &remote.index);

    git.start_merge(theirs)?;
    let applied = apply(git, vault, &plan, &remote, theirs)
        .and_then(|_| git.commit_merge(&commit_message(vault, "merge")));
    if let Err(e) = applied {
        warn!(vault = %vault.name(), error = %e, "merge failed, aborting");
        if let Err(abort) = git.abort_merge() {
            warn!(vault = %vault.name(), error = %abort, "merge --abort failed");
        }
        store::secure_tree(vault.dir())?;
        vault.reload()?;
        return Err(e);
    }
    Ok(plan.report)
}

/// Write incoming records, then the merged index.
fn apply(git: &Git, vault: &mut Vault, plan: &MergePlan, remote: &Snapshot, theirs: &str) -> Result<()> {
    let reseal = !remote.key.same_as(vault.key());
    for slug in plan.incoming() {
        let Some(meta) = remote.index.get(slug) else {
            continue;
        };
        let path = format!("{}/{}", PROFILES_DIR, meta.blob_name());
        let sealed = git.show(theirs, &path)?.ok_or_else(|| VaultError::CorruptRecord {
            slug: meta.slug.clone(),
            reason: format!("remote record {} is missing", meta.blob_name()),
        })?;
        let sealed = if reseal {
            let plaintext = crypto::decrypt(&remote.key, &sealed, &format!("remote profile '{}'", slug))?;
            crypto::encrypt(vault.key(), &plaintext)?
        } else {
            sealed
        };
        vault.write_blob(meta, &sealed)?;
    }
    let merged = plan.merged(vault.index(), &remote.index);
    vault.replace_index(merged)?;
    vault.prune()?;
    Ok(())
}

/// A vault's index as recorded in some commit.
struct Snapshot {
    key: Key,
    index: Index,
}

impl Snapshot {
    /// Read `rev`'s header and index. `None` if `rev` holds no vault.
    fn at(git: &Git, rev: &str, vault: &Vault, secret: &SecretMaterial) -> Result<Option<Self>> {
        let Some(header) = git.show(rev, HEADER_FILE)? else {
            return Ok(None);
        };
        let origin = vault.dir().join(HEADER_FILE);
        let header = VaultHeader::parse(&String::from_utf8_lossy(&header), &origin)?;
        let key = if header.key.id == vault.header().key.id {
            vault.key().clone()
        } else {
            header.unlock(secret)?
        };
        let index = match git.show(rev, INDEX_FILE)? {
            Some(sealed) => Index::open(&key, &sealed, vault.name())?,
            None => Index::default(),
        };
        Ok(Some(Self { key, index }))
    }
}

fn commit_message(vault: &Vault, action: &str) -> String {
    format!(
        "keyswitch {}: {} from {} at {}",
        action,
        vault.name(),
        whoami::devicename(),
        Utc::now().to_rfc3339()
    )
}

fn short(sha: &str) -> &str {
    &sha[..sha.len().min(10)]
}

/// Best-effort removal after a failed create or join.
fn discard_clone(dir: &Path) {
    if let Err(e) = leave_team(dir) {
        warn!(dir = %dir.display(), error = %e, "failed to remove team directory");
    }
}
