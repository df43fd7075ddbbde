//! Vault store.
//!
//! A vault is a directory holding one encrypted profile set:
//!
//! ```text
//! vault.toml                      # header: KDF params, salt, wrapped key
//! index.enc                       # encrypted metadata of every profile
//! profiles/<slug>.<revision>.enc  # one encrypted record per profile
//! .lock                           # advisory writer lock
//! ```
//!
//! Writes follow a fixed order so a crash at any point leaves the previous
//! state readable: the new record is written under a fresh name, then the
//! index is swapped atomically, then the superseded record is removed.

mod header;
mod index;
mod lifecycle;
mod profiles;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

pub use header::VaultHeader;
pub use index::Index;
pub use lifecycle::ImportReport;

use crate::core::constants::{self, HEADER_FILE, INDEX_FILE, PERSONAL, PROFILES_DIR};
use crate::core::crypto::{KdfParams, Key, SecretMaterial};
use crate::core::store::{self, VaultLock, DIR_MODE, FILE_MODE};
use crate::core::types::TeamName;
use crate::error::{ConfigError, Result};

/// An open, unlocked vault.
///
/// Holds the content key in memory for as long as it lives.
pub struct Vault {
    dir: PathBuf,
    name: String,
    header: VaultHeader,
    key: Key,
    index: Index,
    lock_timeout: Duration,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("dir", &self.dir)
            .field("name", &self.name)
            .field("key_id", &self.header.key.id)
            .field("profiles", &self.index.len())
            .finish()
    }
}

impl Vault {
    /// Create a new vault in `dir`.
    ///
    /// # Arguments
    ///
    /// * `dir` - Vault directory; created with mode 0700 if missing
    /// * `name` - `personal` or the team name
    /// * `secret` - Master key the content key is wrapped under
    /// * `params` - Argon2id parameters recorded in the header
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::AlreadyInitialized` if `dir` already holds a vault.
    pub fn init(dir: &Path, name: &str, secret: &SecretMaterial, params: &KdfParams) -> Result<Self> {
        if Self::exists(dir) {
            return Err(ConfigError::AlreadyInitialized {
                path: dir.to_path_buf(),
            }
            .into());
        }
        store::ensure_private_dir(dir)?;
        store::ensure_private_dir(&dir.join(PROFILES_DIR))?;

        let (header, key) = VaultHeader::create(name, secret, params)?;
        let vault = Self {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            header,
            key,
            index: Index::default(),
            lock_timeout: Duration::from_millis(constants::DEFAULT_LOCK_TIMEOUT_MS),
        };
        vault.save_index()?;
        vault.header.save(&dir.join(HEADER_FILE))?;

        info!(vault = %name, path = %dir.display(), "vault initialized");
        Ok(vault)
    }

    /// Open and unlock the vault in `dir`.
    ///
    /// Permissions are verified on every open.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NotInitialized` if there is no vault in `dir`
    /// - `ConfigError::InsecurePermissions` if the directory or its files
    ///   are readable by anyone but the owner
    /// - `VaultError::WrongKey` if `secret` does not unlock it
    pub fn open(dir: &Path, name: &str, secret: &SecretMaterial) -> Result<Self> {
        let header_path = dir.join(HEADER_FILE);
        if !header_path.exists() {
            return Err(ConfigError::NotInitialized {
                path: dir.to_path_buf(),
            }
            .into());
        }
        Self::verify_permissions(dir)?;

        let header = VaultHeader::load(&header_path)?;
        let key = header.unlock(secret)?;
        let index = load_index(dir, &key, name)?;
        debug!(vault = %name, profiles = index.len(), "vault opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            header,
            key,
            index,
            lock_timeout: Duration::from_millis(constants::DEFAULT_LOCK_TIMEOUT_MS),
        })
    }

    /// Whether `dir` holds a vault header.
    pub fn exists(dir: &Path) -> bool {
        dir.join(HEADER_FILE).is_file()
    }

    /// Set how long writers wait for the lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Team namespace of this vault; `None` for the personal vault.
    pub fn namespace(&self) -> Option<TeamName> {
        (self.name != PERSONAL).then(|| self.name.clone())
    }

    pub fn header(&self) -> &VaultHeader {
        &self.header
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub(crate) fn key(&self) -> &Key {
        &self.key
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Take the writer lock.
    pub fn lock(&self) -> Result<VaultLock> {
        VaultLock::acquire(&self.dir, self.lock_timeout)
    }

    /// Run `f` holding the writer lock, against freshly reloaded state.
    ///
    /// Must not be nested: the lock is not reentrant.
    pub fn with_lock<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let _guard = self.lock()?;
        self.reload()?;
        f(self)
    }

    /// Re-read the index from disk.
    pub fn reload(&mut self) -> Result<()> {
        self.index = load_index(&self.dir, &self.key, &self.name)?;
        Ok(())
    }

    /// Replace the in-memory index and persist it.
    pub(crate) fn replace_index(&mut self, index: Index) -> Result<()> {
        let previous = std::mem::replace(&mut self.index, index);
        if let Err(e) = self.save_index() {
            self.index = previous;
            return Err(e);
        }
        Ok(())
    }

    fn save_index(&self) -> Result<()> {
        let sealed = self.index.seal(&self.key)?;
        store::write_atomic(&self.dir.join(INDEX_FILE), &sealed)
    }

    fn profiles_dir(&self) -> PathBuf {
        self.dir.join(PROFILES_DIR)
    }

    fn verify_permissions(dir: &Path) -> Result<()> {
        store::verify_mode(dir, DIR_MODE)?;
        store::verify_mode(&dir.join(HEADER_FILE), FILE_MODE)?;
        let profiles = dir.join(PROFILES_DIR);
        if profiles.exists() {
            store::verify_mode(&profiles, DIR_MODE)?;
        }
        let index = dir.join(INDEX_FILE);
        if index.exists() {
            store::verify_mode(&index, FILE_MODE)?;
        }
        Ok(())
    }
}

fn load_index(dir: &Path, key: &Key, name: &str) -> Result<Index> {
    match store::read_optional(&dir.join(INDEX_FILE))? {
        Some(sealed) => Index::open(key, &sealed, name),
        None => Ok(Index::default()),
    }
}
