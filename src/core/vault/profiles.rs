//! Profile CRUD.

use std::fs;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::Vault;
use crate::core::crypto::{self, random_hex};
use crate::core::domain::{Profile, ProfileMeta};
use crate::core::constants::TMP_EXT;
use crate::core::store::{self, FILE_MODE};
use crate::core::validation::validate_slug;
use crate::error::{Result, ValidationError, VaultError};

impl Vault {
    /// Metadata of every profile, sorted by slug. Decrypts nothing but the
    /// index, which is already in memory.
    pub fn list(&self) -> Vec<ProfileMeta> {
        let namespace = self.namespace();
        self.index
            .profiles
            .values()
            .cloned()
            .map(|mut meta| {
                meta.namespace = namespace.clone();
                meta
            })
            .collect()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.index.contains(slug)
    }

    /// Metadata for one profile.
    pub fn meta(&self, slug: &str) -> Result<ProfileMeta> {
        let mut meta = self
            .index
            .get(slug)
            .cloned()
            .ok_or_else(|| self.not_found(slug))?;
        meta.namespace = self.namespace();
        Ok(meta)
    }

    /// Decrypt one profile.
    ///
    /// # Errors
    ///
    /// - `VaultError::ProfileNotFound` if the slug is not in the index
    /// - `CryptoError::Authentication` if the record was tampered with
    /// - `VaultError::CorruptRecord` if it decrypts to an unreadable or
    ///   mismatched profile
    pub fn get(&self, slug: &str) -> Result<Profile> {
        let meta = self.meta(slug)?;
        let sealed = self.read_blob(&meta)?;
        let plaintext = crypto::decrypt(
            &self.key,
            &sealed,
            &format!("profile '{}'", meta.qualified_slug()),
        )?;

        let mut profile: Profile =
            serde_json::from_slice(&plaintext).map_err(|e| VaultError::CorruptRecord {
                slug: meta.qualified_slug(),
                reason: e.to_string(),
            })?;
        if profile.slug != meta.slug {
            return Err(VaultError::CorruptRecord {
                slug: meta.qualified_slug(),
                reason: format!("record belongs to '{}'", profile.slug),
            }
            .into());
        }
        profile.namespace = self.namespace();
        debug!(slug = %meta.qualified_slug(), "profile decrypted");
        Ok(profile)
    }

    /// Store a profile.
    ///
    /// # Arguments
    ///
    /// * `profile` - The profile; its slug determines the record
    /// * `force` - Replace an existing profile with the same slug
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DuplicateSlug` if the slug exists and
    /// `force` is false, or `VaultError::Locked` if another writer holds the
    /// vault past the lock timeout.
    pub fn put(&mut self, profile: Profile, force: bool) -> Result<ProfileMeta> {
        profile.validate()?;
        self.with_lock(|vault| vault.put_locked(profile, force))
    }

    /// Remove a profile.
    pub fn delete(&mut self, slug: &str) -> Result<ProfileMeta> {
        validate_slug(slug)?;
        self.with_lock(|vault| vault.delete_locked(slug))
    }

    /// Read-modify-write one profile under a single lock.
    ///
    /// Keeps `created_at`; the change is rejected if the result is invalid.
    pub fn update(
        &mut self,
        slug: &str,
        change: impl FnOnce(&mut Profile) -> Result<()>,
    ) -> Result<ProfileMeta> {
        self.with_lock(|vault| {
            let mut profile = vault.get(slug)?;
            change(&mut profile)?;
            profile.validate()?;
            vault.put_locked(profile, true)
        })
    }

    /// [`Vault::put`] for callers already holding the lock.
    pub(crate) fn put_locked(&mut self, mut profile: Profile, force: bool) -> Result<ProfileMeta> {
        if self.contains(&profile.slug) && !force {
            return Err(ValidationError::DuplicateSlug {
                slug: profile.qualified_slug(),
            }
            .into());
        }

        profile.modified_at = Utc::now();
        profile.namespace = self.namespace();
        let meta = ProfileMeta::describe(&profile, random_hex(8));

        let plaintext = zeroize::Zeroizing::new(serde_json::to_vec(&profile)?);
        let sealed = crypto::encrypt(&self.key, &plaintext)?;
        self.write_blob(&meta, &sealed)?;

        let mut index = self.index.clone();
        let previous = index.profiles.insert(meta.slug.clone(), meta.clone());
        if let Err(e) = self.replace_index(index) {
            let _ = store::remove_if_exists(&self.profiles_dir().join(meta.blob_name()));
            return Err(e);
        }
        if let Some(previous) = previous {
            self.discard_blob(&previous);
        }

        info!(slug = %meta.qualified_slug(), revision = %meta.revision, "profile stored");
        Ok(meta)
    }

    /// [`Vault::delete`] for callers already holding the lock.
    pub(crate) fn delete_locked(&mut self, slug: &str) -> Result<ProfileMeta> {
        let mut index = self.index.clone();
        let mut removed = index
            .profiles
            .remove(slug)
            .ok_or_else(|| self.not_found(slug))?;
        self.replace_index(index)?;
        self.discard_blob(&removed);

        removed.namespace = self.namespace();
        info!(slug = %removed.qualified_slug(), "profile removed");
        Ok(removed)
    }

    /// Raw sealed record for `meta`.
    pub(crate) fn read_blob(&self, meta: &ProfileMeta) -> Result<Vec<u8>> {
        let path = self.profiles_dir().join(meta.blob_name());
        match store::read_optional(&path)? {
            Some(bytes) => {
                store::verify_mode(&path, FILE_MODE)?;
                Ok(bytes)
            }
            None => Err(VaultError::CorruptRecord {
                slug: meta.qualified_slug(),
                reason: format!("record file {} is missing", meta.blob_name()),
            }
            .into()),
        }
    }

    /// Write a sealed record for `meta`. Does not touch the index.
    pub(crate) fn write_blob(&self, meta: &ProfileMeta, sealed: &[u8]) -> Result<()> {
        store::ensure_private_dir(&self.profiles_dir())?;
        store::write_atomic(&self.profiles_dir().join(meta.blob_name()), sealed)
    }

    fn discard_blob(&self, meta: &ProfileMeta) {
        let path = self.profiles_dir().join(meta.blob_name());
        if let Err(e) = store::remove_if_exists(&path) {
            warn!(path = %path.display(), error = %e, "failed to remove superseded record");
        }
    }

    /// Delete record files the index does not reference, including
    /// leftovers of interrupted writes. Caller must hold the lock.
    pub(crate) fn prune(&self) -> Result<usize> {
        let dir = self.profiles_dir();
        if !dir.exists() {
            return Ok(0);
        }
        let live: std::collections::BTreeSet<String> = self
            .index
            .profiles
            .values()
            .map(ProfileMeta::blob_name)
            .collect();

        let mut removed = 0;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let stale_tmp = name.ends_with(&format!(".{}", TMP_EXT));
            if stale_tmp || !live.contains(&name) {
                if store::remove_if_exists(&entry.path())? {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            debug!(vault = %self.name, removed, "pruned orphaned records");
        }
        Ok(removed)
    }

    fn not_found(&self, slug: &str) -> crate::error::Error {
        let qualified = match self.namespace() {
            Some(ns) => format!("{}/{}", ns, slug),
            None => slug.to_string(),
        };
        VaultError::ProfileNotFound { slug: qualified }.into()
    }
}
