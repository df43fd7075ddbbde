//! Identity context.
//!
//! Resolves which profile is active for a directory. Three layers are
//! consulted in order and the first one set wins:
//!
//! 1. the session override (`KEYSWITCH_PROFILE`), read fresh on each call
//! 2. a directory link on the working directory or its closest ancestor
//! 3. the global active pointer
//!
//! Links and the global pointer live in `local.toml` inside the personal
//! vault directory. The file is machine-local and excluded from sync.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::crypto::{self, KdfParams, Key, SecretMaterial};
use crate::core::domain::{Layer, Resolved};
use crate::core::store;
use crate::core::types::TeamName;
use crate::error::{ConfigError, ContextError, Result};

/// Contents of `local.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    /// Global active profile (qualified slug).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
    /// Canonical directory → qualified slug.
    #[serde(default)]
    pub links: BTreeMap<PathBuf, String>,
    /// How team master keys are sealed on this machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyring: Option<Keyring>,
    /// Joined team vaults.
    #[serde(default)]
    pub teams: BTreeMap<TeamName, TeamMount>,
}

/// A team vault registered on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMount {
    pub remote: String,
    pub dir: PathBuf,
    /// Team master key sealed under the [`Keyring`] key, base64.
    pub sealed_key: String,
    pub joined_at: DateTime<Utc>,
}

/// Derivation of the key that seals team master keys.
///
/// The key comes from the personal master key and a machine-local salt, so
/// it does not change when a pull replaces the personal vault header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyring {
    /// Base64 salt.
    pub salt: String,
    pub kdf: KdfParams,
}

impl Keyring {
    /// A keyring with a fresh salt.
    pub fn generate(kdf: &KdfParams) -> Self {
        Self {
            salt: crypto::encode_b64(&crypto::generate_salt()),
            kdf: *kdf,
        }
    }

    /// Derive the sealing key from the personal master key.
    pub fn derive(&self, personal: &SecretMaterial) -> Result<Key> {
        let salt = crypto::decode_b64(&self.salt, "keyring salt")?;
        crypto::derive_key(personal, &salt, &self.kdf)
    }
}

impl LocalState {
    /// Load from `path`; a missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        let Some(bytes) = store::read_optional(path)? else {
            return Ok(Self::default());
        };
        store::verify_mode(path, store::FILE_MODE)?;
        toml::from_str(&String::from_utf8_lossy(&bytes)).map_err(|e| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Write atomically to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            what: "local state",
            reason: e.to_string(),
        })?;
        store::write_atomic(path, text.as_bytes())
    }

    /// Resolve the active profile for `cwd`.
    ///
    /// `session` is the current value of the session override. `cwd` should
    /// already be canonical; see [`canonical_dir`].
    pub fn resolve(&self, session: Option<&str>, cwd: &Path) -> Option<Resolved> {
        if let Some(slug) = session.map(str::trim).filter(|s| !s.is_empty()) {
            return Some(Resolved::new(slug, Layer::Session));
        }
        for dir in cwd.ancestors() {
            if let Some(slug) = self.links.get(dir) {
                return Some(Resolved::new(slug.clone(), Layer::Directory(dir.to_path_buf())));
            }
        }
        self.active
            .as_ref()
            .map(|slug| Resolved::new(slug.clone(), Layer::Global))
    }

    /// Drop every reference to `qualified`: the global pointer and links.
    ///
    /// Returns whether anything changed.
    pub fn forget(&mut self, qualified: &str) -> bool {
        let before = (self.active.clone(), self.links.len());
        if self.active.as_deref() == Some(qualified) {
            self.active = None;
        }
        self.links.retain(|_, slug| slug != qualified);
        let changed = before != (self.active.clone(), self.links.len());
        if changed {
            debug!(slug = %qualified, "cleared context references");
        }
        changed
    }

    /// Drop every reference to profiles of `team`.
    pub fn forget_namespace(&mut self, team: &str) {
        let prefix = format!("{}/", team);
        if self
            .active
            .as_deref()
            .is_some_and(|slug| slug.starts_with(&prefix))
        {
            self.active = None;
        }
        self.links.retain(|_, slug| !slug.starts_with(&prefix));
        self.teams.remove(team);
    }
}

/// Canonicalize a directory for use as a link key.
///
/// # Errors
///
/// Returns `ContextError::InvalidDirectory` if it does not exist.
pub fn canonical_dir(dir: &Path) -> Result<PathBuf> {
    dir.canonicalize().map_err(|source| {
        ContextError::InvalidDirectory {
            path: dir.to_path_buf(),
            source,
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state() -> LocalState {
        let mut state = LocalState {
            active: Some("home".to_string()),
            ..Default::default()
        };
        state
            .links
            .insert(PathBuf::from("/src/work"), "work".to_string());
        state
            .links
            .insert(PathBuf::from("/src/work/client"), "acme/client".to_string());
        state
    }

    #[test]
    fn test_session_beats_everything() {
        let resolved = state()
            .resolve(Some("scratch"), Path::new("/src/work/client/app"))
            .unwrap();
        assert_eq!(resolved, Resolved::new("scratch", Layer::Session));
    }

    #[test]
    fn test_closest_link_wins() {
        let s = state();
        let resolved = s.resolve(None, Path::new("/src/work/client/app")).unwrap();
        assert_eq!(resolved.slug, "acme/client");
        assert_eq!(
            resolved.layer,
            Layer::Directory(PathBuf::from("/src/work/client"))
        );

        let resolved = s.resolve(None, Path::new("/src/work/other")).unwrap();
        assert_eq!(resolved.slug, "work");
    }

    #[test]
    fn test_global_fallback_and_none() {
        let resolved = state().resolve(Some("  "), Path::new("/elsewhere")).unwrap();
        assert_eq!(resolved, Resolved::new("home", Layer::Global));

        assert!(LocalState::default()
            .resolve(None, Path::new("/elsewhere"))
            .is_none());
    }

    #[test]
    fn test_forget_clears_pointer_and_links() {
        let mut s = state();
        s.links.insert(PathBuf::from("/tmp/x"), "home".to_string());
        assert!(s.forget("home"));
        assert!(s.active.is_none());
        assert_eq!(s.links.len(), 2);
        assert!(!s.forget("home"));
    }

    #[test]
    fn test_forget_namespace() {
        let mut s = state();
        s.active = Some("acme/deploy".to_string());
        s.forget_namespace("acme");
        assert!(s.active.is_none());
        assert_eq!(s.links.len(), 1);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("local.toml");
        let mut s = state();
        s.keyring = Some(Keyring::generate(&crypto::fast_params()));
        s.teams.insert(
            "acme".to_string(),
            TeamMount {
                remote: "git@example.com:acme/vault.git".to_string(),
                dir: PathBuf::from("/tmp/teams/acme"),
                sealed_key: "c2VhbGVk".to_string(),
                joined_at: Utc::now(),
            },
        );
        s.save(&path).unwrap();
        assert_eq!(LocalState::load(&path).unwrap(), s);
        assert_eq!(LocalState::load(&tmp.path().join("none.toml")).unwrap(), LocalState::default());
    }

    #[test]
    fn test_canonical_dir_requires_existing_path() {
        let tmp = TempDir::new().unwrap();
        assert!(canonical_dir(tmp.path()).is_ok());
        assert!(canonical_dir(&tmp.path().join("missing")).is_err());
    }

    #[test]
    fn test_keyring_is_stable_per_salt() {
        let personal = SecretMaterial::new("personal-master").unwrap();
        let keyring = Keyring::generate(&crypto::fast_params());
        let first = keyring.derive(&personal).unwrap();
        assert!(first.same_as(&keyring.derive(&personal).unwrap()));

        let other = Keyring::generate(&crypto::fast_params());
        assert!(!first.same_as(&other.derive(&personal).unwrap()));
    }
}
