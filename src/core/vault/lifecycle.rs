//! Lifecycle operations.
//!
//! Export and import of portable bundles. A bundle is a TOML file with a
//! versioned header and the full profile set sealed under a key derived from
//! the master key with a fresh salt, so any machine holding the same master
//! key can import it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::Zeroizing;

use super::Vault;
use crate::core::crypto::{self, KdfParams, SecretMaterial};
use crate::core::domain::Profile;
use crate::core::types::Slug;
use crate::error::{Error, Result, SyncError};

const BUNDLE_MAGIC: &str = "keyswitch-bundle";
const BUNDLE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct BundleFile {
    /// Base64 sealed JSON array of profiles.
    payload: String,
    bundle: BundleMeta,
    kdf: BundleKdf,
}

#[derive(Debug, Serialize, Deserialize)]
struct BundleMeta {
    magic: String,
    version: u32,
    created_at: DateTime<Utc>,
    profiles: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct BundleKdf {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
    salt: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<Slug>,
    /// Already present and left untouched.
    pub skipped: Vec<Slug>,
}

impl Vault {
    /// Seal every profile into a bundle.
    ///
    /// # Arguments
    ///
    /// * `secret` - Master key the bundle key is derived from
    /// * `params` - Argon2id parameters, recorded in the bundle
    ///
    /// # Returns
    ///
    /// The bundle file contents.
    pub fn export_bundle(&self, secret: &SecretMaterial, params: &KdfParams) -> Result<Vec<u8>> {
        let profiles = self
            .list()
            .iter()
            .map(|meta| self.get(&meta.slug))
            .collect::<Result<Vec<Profile>>>()?;
        let payload = Zeroizing::new(serde_json::to_vec(&profiles)?);

        let salt = crypto::generate_salt();
        let key = crypto::derive_key(secret, &salt, params)?;
        let sealed = crypto::encrypt(&key, &payload)?;

        let file = BundleFile {
            payload: crypto::encode_b64(&sealed),
            bundle: BundleMeta {
                magic: BUNDLE_MAGIC.to_string(),
                version: BUNDLE_VERSION,
                created_at: Utc::now(),
                profiles: profiles.len(),
            },
            kdf: BundleKdf {
                memory_kib: params.memory_kib,
                iterations: params.iterations,
                parallelism: params.parallelism,
                salt: crypto::encode_b64(&salt),
            },
        };
        let text = toml::to_string_pretty(&file)
            .map_err(|e| SyncError::BundleFormat(e.to_string()))?;

        info!(vault = %self.name, profiles = profiles.len(), "bundle exported");
        Ok(text.into_bytes())
    }

    /// Import a bundle produced by [`Vault::export_bundle`].
    ///
    /// Existing slugs are skipped unless `force` is set. All writes happen
    /// under one lock acquisition.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::BundleFormat` for unreadable bundles and
    /// `CryptoError::Authentication` if `secret` is not the master key the
    /// bundle was sealed with.
    pub fn import_bundle(
        &mut self,
        bytes: &[u8],
        secret: &SecretMaterial,
        force: bool,
    ) -> Result<ImportReport> {
        let text = std::str::from_utf8(bytes).map_err(|e| SyncError::BundleFormat(e.to_string()))?;
        let file: BundleFile =
            toml::from_str(text).map_err(|e| SyncError::BundleFormat(e.to_string()))?;
        if file.bundle.magic != BUNDLE_MAGIC {
            return Err(SyncError::BundleFormat("not a keyswitch bundle".to_string()).into());
        }
        if file.bundle.version != BUNDLE_VERSION {
            return Err(SyncError::BundleFormat(format!(
                "unsupported bundle version {}",
                file.bundle.version
            ))
            .into());
        }

        let params = KdfParams {
            memory_kib: file.kdf.memory_kib,
            iterations: file.kdf.iterations,
            parallelism: file.kdf.parallelism,
        };
        let salt = crypto::decode_b64(&file.kdf.salt, "bundle salt")?;
        let sealed = crypto::decode_b64(&file.payload, "bundle payload")?;
        let key = crypto::derive_key(secret, &salt, &params)?;
        let payload = crypto::decrypt(&key, &sealed, "bundle")?;
        let profiles: Vec<Profile> = serde_json::from_slice(&payload)
            .map_err(|e| Error::from(SyncError::BundleFormat(e.to_string())))?;

        for profile in &profiles {
            profile.validate()?;
        }

        let report = self.with_lock(|vault| {
            let mut report = ImportReport::default();
            for profile in profiles {
                let slug = profile.slug.clone();
                if vault.contains(&slug) && !force {
                    report.skipped.push(slug);
                    continue;
                }
                vault.put_locked(profile, true)?;
                report.imported.push(slug);
            }
            Ok(report)
        })?;

        info!(
            vault = %self.name,
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            "bundle imported"
        );
        Ok(report)
    }
}
