//! Encrypted profile index (`index.enc`).
//!
//! Maps slugs to their non-secret metadata and current revision. The index
//! is the source of truth for which records exist; a blob that the index
//! does not reference is an orphan and is ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::crypto::{self, Key};
use crate::core::domain::ProfileMeta;
use crate::core::types::Slug;
use crate::error::{Result, VaultError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    #[serde(default)]
    pub profiles: BTreeMap<Slug, ProfileMeta>,
}

impl Index {
    /// Serialize and encrypt under the vault content key.
    pub fn seal(&self, key: &Key) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        crypto::encrypt(key, &json)
    }

    /// Decrypt and parse a sealed index.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Authentication` if the index was tampered with,
    /// or `VaultError::CorruptRecord` if it decrypts to something unreadable.
    pub fn open(key: &Key, sealed: &[u8], vault: &str) -> Result<Self> {
        let json = crypto::decrypt(key, sealed, &format!("index of vault '{}'", vault))?;
        serde_json::from_slice(&json).map_err(|e| {
            VaultError::CorruptRecord {
                slug: format!("{} index", vault),
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn get(&self, slug: &str) -> Option<&ProfileMeta> {
        self.profiles.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.profiles.contains_key(slug)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Credential, Profile};

    #[test]
    fn test_seal_open_and_tamper() {
        let key = Key::generate();
        let profile = Profile::new("work", Credential::api_key("sk-1")).unwrap();
        let mut index = Index::default();
        index.profiles.insert(
            profile.slug.clone(),
            ProfileMeta::describe(&profile, "abcd".into()),
        );

        let sealed = index.seal(&key).unwrap();
        assert!(!String::from_utf8_lossy(&sealed).contains("work"));
        assert_eq!(Index::open(&key, &sealed, "personal").unwrap(), index);

        let mut tampered = sealed.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        assert!(Index::open(&key, &tampered, "personal")
            .unwrap_err()
            .is_authentication());
    }
}
