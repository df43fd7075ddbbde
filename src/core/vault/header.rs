//! Vault header (`vault.toml`).
//!
//! The only plaintext file in a vault. It carries what is needed to turn the
//! master key back into the content key: KDF parameters, the salt, and the
//! wrapped key itself.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::core::constants::FORMAT_VERSION;
use crate::core::crypto::{self, KdfParams, Key, SecretMaterial};
use crate::core::store;
use crate::error::{ConfigError, Error, Result, VaultError};

const KDF_ALGORITHM: &str = "argon2id";

/// Parsed `vault.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultHeader {
    pub vault: HeaderMeta,
    pub kdf: KdfSection,
    pub key: KeySection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMeta {
    pub format: u32,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfSection {
    pub algorithm: String,
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    /// Base64 salt.
    pub salt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySection {
    /// Fingerprint of the content key.
    pub id: String,
    /// Base64 content key, sealed under the KEK.
    pub wrapped: String,
}

impl VaultHeader {
    /// Create a header for a fresh vault and return it with its content key.
    pub fn create(name: &str, secret: &SecretMaterial, params: &KdfParams) -> Result<(Self, Key)> {
        let salt = crypto::generate_salt();
        let kek = crypto::derive_key(secret, &salt, params)?;
        let content_key = Key::generate();
        let wrapped = crypto::wrap_key(&kek, &content_key)?;

        let header = Self {
            vault: HeaderMeta {
                format: FORMAT_VERSION,
                name: name.to_string(),
                created_at: Utc::now(),
            },
            kdf: KdfSection {
                algorithm: KDF_ALGORITHM.to_string(),
                memory_kib: params.memory_kib,
                iterations: params.iterations,
                parallelism: params.parallelism,
                salt: crypto::encode_b64(&salt),
            },
            key: KeySection {
                id: content_key.id(),
                wrapped: crypto::encode_b64(&wrapped),
            },
        };
        Ok((header, content_key))
    }

    /// Parse header text; `origin` is only used in errors.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let header: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        if header.vault.format != FORMAT_VERSION {
            return Err(ConfigError::UnsupportedFormat {
                found: header.vault.format,
                expected: FORMAT_VERSION,
            }
            .into());
        }
        if header.kdf.algorithm != KDF_ALGORITHM {
            return Err(ConfigError::Parse {
                path: origin.to_path_buf(),
                reason: format!("unsupported kdf '{}'", header.kdf.algorithm),
            }
            .into());
        }
        Ok(header)
    }

    /// Load and parse `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            what: "vault header",
            reason: e.to_string(),
        })?;
        store::write_atomic(path, text.as_bytes())
    }

    /// KDF parameters recorded at creation.
    pub fn params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.kdf.memory_kib,
            iterations: self.kdf.iterations,
            parallelism: self.kdf.parallelism,
        }
    }

    /// Derive the KEK from `secret` and unwrap the content key.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::WrongKey` if `secret` is not this vault's master
    /// key.
    pub fn unlock(&self, secret: &SecretMaterial) -> Result<Key> {
        let salt = crypto::decode_b64(&self.kdf.salt, "vault salt")?;
        let wrapped = crypto::decode_b64(&self.key.wrapped, "wrapped key")?;
        let kek = crypto::derive_key(secret, &salt, &self.params())?;

        let key = crypto::unwrap_key(&kek, &wrapped).map_err(|e| match e {
            e if e.is_authentication() => Error::from(VaultError::WrongKey {
                vault: self.vault.name.clone(),
            }),
            other => other,
        })?;

        if !bool::from(key.id().as_bytes().ct_eq(self.key.id.as_bytes())) {
            return Err(VaultError::CorruptRecord {
                slug: self.vault.name.clone(),
                reason: "content key does not match its fingerprint".to_string(),
            }
            .into());
        }
        debug!(vault = %self.vault.name, key_id = %self.key.id, "vault unlocked");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::fast_params;
    use tempfile::TempDir;

    #[test]
    fn test_create_then_unlock() {
        let secret = SecretMaterial::new("master").unwrap();
        let (header, key) = VaultHeader::create("personal", &secret, &fast_params()).unwrap();
        assert_eq!(header.params(), fast_params());

        let unlocked = header.unlock(&secret).unwrap();
        assert!(unlocked.same_as(&key));
    }

    #[test]
    fn test_wrong_secret_is_wrong_key() {
        let secret = SecretMaterial::new("master").unwrap();
        let (header, _) = VaultHeader::create("acme", &secret, &fast_params()).unwrap();

        let err = header
            .unlock(&SecretMaterial::new("guess").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::Vault(VaultError::WrongKey { ref vault }) if vault == "acme"));
    }

    #[test]
    fn test_save_load_and_format_check() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vault.toml");
        let secret = SecretMaterial::new("master").unwrap();
        let (header, _) = VaultHeader::create("personal", &secret, &fast_params()).unwrap();
        header.save(&path).unwrap();
        assert_eq!(VaultHeader::load(&path).unwrap(), header);

        let future = std::fs::read_to_string(&path)
            .unwrap()
            .replace("format = 1", "format = 99");
        let err = VaultHeader::parse(&future, &path).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::UnsupportedFormat { found: 99, .. })
        ));
    }
}
