//! Configuration management.
//!
//! Resolves the keyswitch root directory and loads `settings.toml`, the
//! optional user settings file. Every section has defaults, so a missing file
//! or a partial one is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::constants;
use crate::core::crypto::KdfParams;
use crate::core::store;
use crate::core::validation::validate_env_name;
use crate::error::{ConfigError, Result};

/// User settings stored in `settings.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Argon2id parameters for newly created vaults and bundles.
    pub kdf: KdfParams,
    pub lock: LockSettings,
    pub inject: InjectSettings,
    pub sync: SyncSettings,
}

/// Vault lock behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// How long to wait for another writer before giving up.
    pub timeout_ms: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout_ms: constants::DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl LockSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Environment variables the injection proxy populates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectSettings {
    /// Receives the API key of `api_key` profiles.
    pub api_key_var: String,
    /// Receives the access token of `oauth` profiles.
    pub access_token_var: String,
    /// Receives the refresh token of `oauth` profiles, when present.
    pub refresh_token_var: Option<String>,
    /// Also export the resolved slug to the child.
    pub export_profile_name: bool,
}

impl Default for InjectSettings {
    fn default() -> Self {
        Self {
            api_key_var: constants::DEFAULT_API_KEY_VAR.to_string(),
            access_token_var: constants::DEFAULT_ACCESS_TOKEN_VAR.to_string(),
            refresh_token_var: Some(constants::DEFAULT_REFRESH_TOKEN_VAR.to_string()),
            export_profile_name: false,
        }
    }
}

/// Git sync behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub branch: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            branch: constants::DEFAULT_BRANCH.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults if it is absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::InvalidSetting` for values that fail validation.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match store::read_optional(path)? {
            Some(bytes) => bytes,
            None => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
        };
        let text = String::from_utf8_lossy(&contents);
        let settings: Self = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        settings.validate()?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Write settings to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            what: "settings",
            reason: e.to_string(),
        })?;
        store::write_atomic(path, text.as_bytes())
    }

    /// Validate settings values.
    pub fn validate(&self) -> Result<()> {
        self.kdf.validate().map_err(|e| ConfigError::InvalidSetting {
            field: "kdf".to_string(),
            reason: e.to_string(),
        })?;

        let vars = [
            Some(("inject.api_key_var", &self.inject.api_key_var)),
            Some(("inject.access_token_var", &self.inject.access_token_var)),
            self.inject
                .refresh_token_var
                .as_ref()
                .map(|v| ("inject.refresh_token_var", v)),
        ];
        for (field, var) in vars.into_iter().flatten() {
            validate_env_name(var).map_err(|e| ConfigError::InvalidSetting {
                field: field.to_string(),
                reason: e.to_string(),
            })?;
        }

        if self.sync.branch.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                field: "sync.branch".to_string(),
                reason: "cannot be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Layout of the keyswitch root directory.
///
/// ```text
/// <root>/
/// ├── master.key          # personal master key (0600, never synced)
/// ├── settings.toml
/// ├── audit/<vault>.log   # JSON-lines audit trail per vault
/// ├── personal/           # personal vault (git repo once sync is set up)
/// │   ├── vault.toml
/// │   ├── index.enc
/// │   ├── profiles/<slug>.<revision>.enc
/// │   └── local.toml      # active profile, links, team mounts
/// └── teams/<name>/       # joined team vaults, same layout minus local.toml
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `KEYSWITCH_HOME`, else `~/.keyswitch`.
    pub fn from_env() -> Result<Self> {
        if let Some(home) = std::env::var_os(constants::HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(home));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(Self::new(home.join(constants::ROOT_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn master_key(&self) -> PathBuf {
        self.root.join(constants::MASTER_KEY_FILE)
    }

    pub fn settings(&self) -> PathBuf {
        self.root.join(constants::SETTINGS_FILE)
    }

    pub fn personal(&self) -> PathBuf {
        self.root.join(constants::PERSONAL)
    }

    pub fn local_state(&self) -> PathBuf {
        self.personal().join(constants::LOCAL_STATE_FILE)
    }

    pub fn teams(&self) -> PathBuf {
        self.root.join(constants::TEAMS_DIR)
    }

    pub fn team(&self, name: &str) -> PathBuf {
        self.teams().join(name)
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join(constants::AUDIT_DIR)
    }

    /// Audit log of a vault.
    pub fn audit_log(&self, vault: &str) -> PathBuf {
        self.audit_dir().join(format!("{}.log", vault))
    }
}
