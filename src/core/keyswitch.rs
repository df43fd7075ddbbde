//! Keyswitch.
//!
//! The primary interface for all keyswitch operations. Every call opens the
//! vaults it needs, does one logical operation and drops them again, so no
//! state outlives the call except what is on disk.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::audit::{newest_first, AuditLog};
use crate::core::config::{Paths, Settings};
use crate::core::constants::{MASTER_KEY_ENV, PERSONAL, SESSION_ENV};
use crate::core::context::{canonical_dir, Keyring, LocalState, TeamMount};
use crate::core::crypto::{self, Key, SecretMaterial};
use crate::core::domain::{
    Action, AuditEntry, AuditFilter, MergeReport, Profile, ProfileMeta, ProfileView, PushReport,
    QualifiedSlug, Resolved, VaultInfo,
};
use crate::core::runner::{self, Injection};
use crate::core::store::{self, VaultLock, DIR_MODE, FILE_MODE};
use crate::core::sync;
use crate::core::validation::{validate_env_name, validate_team_name};
use crate::core::vault::{ImportReport, Vault};
use crate::error::{ConfigError, ContextError, Result, RunError, SyncError, VaultError};

/// Source of environment variables.
///
/// The session override and the master key are read through this, so tests
/// can supply their own values without touching the process environment.
pub trait Environment {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// A problem that did not stop the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// An audit entry could not be written.
    AuditFailed { vault: String, reason: String },
    /// A joined team vault could not be opened and was skipped.
    TeamUnavailable { team: String, reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::AuditFailed { vault, reason } => {
                write!(f, "audit log for '{}' not written: {}", vault, reason)
            }
            Warning::TeamUnavailable { team, reason } => {
                write!(f, "team '{}' skipped: {}", team, reason)
            }
        }
    }
}

/// Outcome of [`Keyswitch::init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub root: PathBuf,
    /// Where a new master key was written, if one was generated.
    pub master_key_file: Option<PathBuf>,
}

/// The primary interface for keyswitch operations.
pub struct Keyswitch {
    paths: Paths,
    settings: Settings,
    env: Box<dyn Environment>,
    warnings: RefCell<Vec<Warning>>,
    /// Team sealing key with the salt it was derived from.
    seal_cache: RefCell<Option<(String, Key)>>,
}

impl fmt::Debug for Keyswitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyswitch")
            .field("root", &self.paths.root())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Keyswitch {
    // --- Construction ---

    /// Use the root from `KEYSWITCH_HOME` (or `~/.keyswitch`) and the
    /// process environment.
    pub fn from_env() -> Result<Self> {
        Self::new(Paths::from_env()?, Box::new(ProcessEnv))
    }

    /// Use an explicit root and environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` or `ConfigError::InvalidSetting` if
    /// `settings.toml` exists and is invalid.
    pub fn new(paths: Paths, env: Box<dyn Environment>) -> Result<Self> {
        let settings = Settings::load(&paths.settings())?;
        Ok(Self {
            paths,
            settings,
            env,
            warnings: RefCell::new(Vec::new()),
            seal_cache: RefCell::new(None),
        })
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Drain the warnings collected so far.
    pub fn take_warnings(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.warnings.borrow_mut())
    }

    // --- Lifecycle ---

    /// Create the root directory, the master key and the personal vault.
    ///
    /// A master key is generated into `master.key` unless
    /// `KEYSWITCH_MASTER_KEY` is set or the file already exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::AlreadyInitialized` if the personal vault exists.
    pub fn init(&self) -> Result<InitReport> {
        let personal = self.paths.personal();
        if Vault::exists(&personal) {
            return Err(ConfigError::AlreadyInitialized { path: personal }.into());
        }
        store::ensure_private_dir(self.paths.root())?;

        let key_file = self.paths.master_key();
        let mut generated = None;
        let master = match self.env_master() {
            Some(master) => master?,
            None if key_file.exists() => self.read_master_file()?,
            None => {
                let master = SecretMaterial::generate();
                let mut text = master.expose();
                text.push('\n');
                store::write_atomic(&key_file, text.as_bytes())?;
                generated = Some(key_file);
                master
            }
        };

        Vault::init(&personal, PERSONAL, &master, &self.settings.kdf)?;
        store::ensure_private_dir(&self.paths.audit_dir())?;
        info!(root = %self.paths.root().display(), "keyswitch initialized");

        Ok(InitReport {
            root: self.paths.root().to_path_buf(),
            master_key_file: generated,
        })
    }

    // --- Profiles ---

    /// Store a profile in its namespace's vault.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DuplicateSlug` if it exists and `force` is
    /// false.
    pub fn add(&self, profile: Profile, force: bool) -> Result<ProfileMeta> {
        let namespace = profile.namespace.clone();
        let mut vault = self.open(namespace.as_deref())?;
        let meta = vault.put(profile, force)?;
        self.audit(vault.name(), &meta.qualified_slug(), Action::Modify, false);
        Ok(meta)
    }

    /// Remove a profile and every context reference to it.
    pub fn remove(&self, target: &QualifiedSlug) -> Result<ProfileMeta> {
        let mut vault = self.open(target.namespace.as_deref())?;
        let meta = vault.delete(&target.slug)?;
        let qualified = target.to_string();
        self.update_state(|state| Ok(state.forget(&qualified)))?;
        self.audit(vault.name(), &qualified, Action::Delete, false);
        Ok(meta)
    }

    /// Metadata of every accessible profile, personal first, then teams.
    ///
    /// Teams that cannot be opened are skipped with a warning.
    pub fn list(&self, tag: Option<&str>) -> Result<Vec<ProfileMeta>> {
        let personal = self.open_personal()?;
        let state = self.load_state()?;

        let mut profiles = personal.list();
        for team in state.teams.keys() {
            match self.open_team(&state, team) {
                Ok(vault) => profiles.extend(vault.list()),
                Err(e) => self.skip_team(team, &e),
            }
        }
        if let Some(tag) = tag {
            profiles.retain(|meta| meta.tags.contains(tag));
        }
        Ok(profiles)
    }

    /// Decrypt a profile for display.
    ///
    /// Secrets are masked unless `unmasked` is set; the audit entry records
    /// which.
    pub fn get(&self, target: &QualifiedSlug, unmasked: bool) -> Result<ProfileView> {
        let vault = self.open(target.namespace.as_deref())?;
        let profile = vault.get(&target.slug)?;
        self.audit(vault.name(), &profile.qualified_slug(), Action::Read, unmasked);
        Ok(profile.view(unmasked))
    }

    /// Set an extra environment variable on a profile.
    pub fn env_set(&self, target: &QualifiedSlug, name: &str, value: &str) -> Result<ProfileMeta> {
        validate_env_name(name)?;
        let mut vault = self.open(target.namespace.as_deref())?;
        let meta = vault.update(&target.slug, |profile| {
            profile.env.insert(name.to_string(), value.to_string());
            Ok(())
        })?;
        self.audit(vault.name(), &meta.qualified_slug(), Action::Modify, false);
        Ok(meta)
    }

    /// Remove an extra environment variable. Returns whether it was set.
    pub fn env_unset(&self, target: &QualifiedSlug, name: &str) -> Result<bool> {
        let mut vault = self.open(target.namespace.as_deref())?;
        if !vault.meta(&target.slug)?.env_names.contains(name) {
            return Ok(false);
        }
        let meta = vault.update(&target.slug, |profile| {
            profile.env.remove(name);
            Ok(())
        })?;
        self.audit(vault.name(), &meta.qualified_slug(), Action::Modify, false);
        Ok(true)
    }

    // --- Context ---

    /// Make `target` the globally active profile.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::ProfileNotFound` if no accessible vault holds it.
    pub fn switch(&self, target: &QualifiedSlug) -> Result<ProfileMeta> {
        let vault = self.open(target.namespace.as_deref())?;
        let meta = vault.meta(&target.slug)?;
        let qualified = target.to_string();
        self.update_state(|state| {
            state.active = Some(qualified.clone());
            Ok(())
        })?;
        self.audit(vault.name(), &qualified, Action::Switch, false);
        info!(slug = %qualified, "switched active profile");
        Ok(meta)
    }

    /// The profile active in `cwd`, and which layer chose it.
    ///
    /// Reads no secrets and needs no master key.
    pub fn resolve(&self, cwd: &Path) -> Result<Option<Resolved>> {
        self.require_initialized()?;
        let state = self.load_state()?;
        let cwd = canonical_dir(cwd)?;
        let session = self.env.var(SESSION_ENV);
        let resolved = state.resolve(session.as_deref(), &cwd);
        debug!(cwd = %cwd.display(), resolved = ?resolved, "resolved identity");
        Ok(resolved)
    }

    /// Same as [`Keyswitch::resolve`].
    pub fn status(&self, cwd: &Path) -> Result<Option<Resolved>> {
        self.resolve(cwd)
    }

    /// Link `cwd` to `target`. Returns the canonical directory linked.
    pub fn context_set(&self, cwd: &Path, target: &QualifiedSlug) -> Result<PathBuf> {
        let dir = canonical_dir(cwd)?;
        self.open(target.namespace.as_deref())?.meta(&target.slug)?;
        let qualified = target.to_string();
        self.update_state(|state| {
            state.links.insert(dir.clone(), qualified.clone());
            Ok(())
        })?;
        info!(dir = %dir.display(), slug = %qualified, "linked directory");
        Ok(dir)
    }

    /// Remove the link on exactly `cwd`. Returns whether one existed.
    pub fn context_unset(&self, cwd: &Path) -> Result<bool> {
        self.require_initialized()?;
        let dir = canonical_dir(cwd)?;
        let removed = self.update_state(|state| Ok(state.links.remove(&dir).is_some()))?;
        if removed {
            info!(dir = %dir.display(), "unlinked directory");
        }
        Ok(removed)
    }

    // --- Injection ---

    /// Run `argv` with the profile active in `cwd` injected.
    ///
    /// `overrides` take precedence over the profile's own variables.
    ///
    /// # Returns
    ///
    /// The child's exit code.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::NoActiveIdentity` without running anything if
    /// no profile is active.
    pub fn run(&self, argv: &[String], cwd: &Path, overrides: &[(String, String)]) -> Result<i32> {
        if argv.is_empty() {
            return Err(RunError::EmptyCommand.into());
        }
        let resolved = self.resolve(cwd)?.ok_or(ContextError::NoActiveIdentity)?;
        let target: QualifiedSlug = resolved.slug.parse()?;

        let vault = self.open(target.namespace.as_deref())?;
        let profile = vault.get(&target.slug)?;
        let injection =
            Injection::for_profile(&profile, &self.settings.inject).with_overrides(overrides)?;
        let vault_name = vault.name().to_string();
        drop(profile);
        drop(vault);

        self.audit(&vault_name, &target.to_string(), Action::Inject, true);
        info!(slug = %target, layer = %resolved.layer, "injecting profile");
        runner::run(argv, injection)
    }

    // --- Audit ---

    /// Audit entries of every vault on this machine, newest first.
    pub fn audit_query(&self, filter: &AuditFilter) -> Result<impl Iterator<Item = AuditEntry>> {
        let dir = self.paths.audit_dir();
        let mut sources = Vec::new();
        if dir.exists() {
            let mut logs: Vec<PathBuf> = fs::read_dir(&dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
                .collect();
            logs.sort();
            for path in logs {
                sources.push(AuditLog::new(path).query(filter)?);
            }
        }
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(newest_first(sources).take(limit))
    }

    // --- Sync ---

    /// Configure the git remote of a vault (`None` for personal).
    pub fn sync_init(&self, url: &str, namespace: Option<&str>) -> Result<()> {
        let vault = self.open(namespace)?;
        sync::init(&vault, url, &self.settings.sync.branch)?;
        if let Some(team) = namespace {
            self.update_state(|state| {
                if let Some(mount) = state.teams.get_mut(team) {
                    mount.remote = url.to_string();
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Commit and push a vault.
    pub fn sync_push(&self, namespace: Option<&str>) -> Result<PushReport> {
        let mut vault = self.open(namespace)?;
        let report = sync::push(&mut vault, &self.settings.sync.branch)?;
        self.audit(vault.name(), vault.name(), Action::Sync, false);
        Ok(report)
    }

    /// Pull a vault and merge remote changes in.
    pub fn sync_pull(&self, namespace: Option<&str>) -> Result<MergeReport> {
        let personal = self.open_personal()?;
        let (mut vault, secret) = match namespace {
            None => (personal, self.master_secret()?),
            Some(team) => {
                let state = self.load_state()?;
                (self.open_team(&state, team)?, self.team_secret(&state, team)?)
            }
        };
        let report = sync::pull(&mut vault, &secret, &self.settings.sync.branch)?;
        self.audit(vault.name(), vault.name(), Action::Sync, false);
        Ok(report)
    }

    // --- Teams ---

    /// Create a team vault, publish it to `url` and join it.
    pub fn team_create(&self, name: &str, url: &str, master: &SecretMaterial) -> Result<VaultInfo> {
        validate_team_name(name)?;
        self.open_personal()?;
        self.ensure_unregistered(name)?;
        let dir = self.paths.team(name);
        store::ensure_private_dir(&self.paths.teams())?;

        let vault = sync::create_team(
            &dir,
            name,
            url,
            master,
            &self.settings.kdf,
            &self.settings.sync.branch,
        )?;
        self.register(name, url, &dir, master)?;
        Ok(vault_info(&vault, Some(url.to_string())))
    }

    /// Clone and unlock a team vault.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidMasterKey` if `master` is wrong; nothing is
    /// registered in that case.
    pub fn team_join(&self, name: &str, url: &str, master: &SecretMaterial) -> Result<VaultInfo> {
        validate_team_name(name)?;
        self.open_personal()?;
        self.ensure_unregistered(name)?;
        let dir = self.paths.team(name);
        store::ensure_private_dir(&self.paths.teams())?;

        let vault = sync::join_team(&dir, name, url, master, &self.settings.sync.branch)?;
        self.register(name, url, &dir, master)?;
        Ok(vault_info(&vault, Some(url.to_string())))
    }

    /// Joined team vaults. Profile counts are missing for teams that cannot
    /// be opened.
    pub fn team_list(&self) -> Result<Vec<VaultInfo>> {
        self.open_personal()?;
        let state = self.load_state()?;
        Ok(state
            .teams
            .iter()
            .map(|(team, mount)| VaultInfo {
                name: team.clone(),
                path: mount.dir.clone(),
                remote: Some(mount.remote.clone()),
                profile_count: self
                    .open_team(&state, team)
                    .map(|vault| vault.len())
                    .map_err(|e| self.skip_team(team, &e))
                    .ok(),
            })
            .collect())
    }

    /// Unregister a team and delete its local copy.
    pub fn team_leave(&self, name: &str) -> Result<()> {
        self.require_initialized()?;
        let state = self.load_state()?;
        let mount = self.mount(&state, name)?.clone();
        self.update_state(|state| {
            state.forget_namespace(name);
            Ok(())
        })?;
        sync::leave_team(&mount.dir)?;
        info!(team = %name, "left team");
        Ok(())
    }

    // --- Bundles ---

    /// Write every personal profile to an encrypted bundle at `path`.
    ///
    /// Returns the number of profiles exported.
    pub fn export(&self, path: &Path) -> Result<usize> {
        let vault = self.open_personal()?;
        let bundle = vault.export_bundle(&self.master_secret()?, &self.settings.kdf)?;
        store::write_atomic(path, &bundle)?;
        Ok(vault.len())
    }

    /// Merge a bundle into the personal vault.
    pub fn import(&self, path: &Path, force: bool) -> Result<ImportReport> {
        let bytes = fs::read(path)?;
        let mut vault = self.open_personal()?;
        let report = vault.import_bundle(&bytes, &self.master_secret()?, force)?;
        for slug in &report.imported {
            self.audit(vault.name(), slug, Action::Modify, false);
        }
        Ok(report)
    }

    // --- Internals ---

    fn require_initialized(&self) -> Result<()> {
        if !Vault::exists(&self.paths.personal()) {
            return Err(ConfigError::NotInitialized {
                path: self.paths.root().to_path_buf(),
            }
            .into());
        }
        Ok(())
    }

    fn env_master(&self) -> Option<Result<SecretMaterial>> {
        self.env
            .var(MASTER_KEY_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretMaterial::new(&v))
    }

    fn read_master_file(&self) -> Result<SecretMaterial> {
        let path = self.paths.master_key();
        let Some(bytes) = store::read_optional(&path)? else {
            return Err(ConfigError::MissingMasterKey.into());
        };
        store::verify_mode(&path, FILE_MODE)?;
        let text = zeroize::Zeroizing::new(String::from_utf8_lossy(&bytes).into_owned());
        SecretMaterial::new(&text)
    }

    /// The personal master key: `KEYSWITCH_MASTER_KEY`, else `master.key`.
    fn master_secret(&self) -> Result<SecretMaterial> {
        match self.env_master() {
            Some(master) => master,
            None => self.read_master_file(),
        }
    }

    fn open_personal(&self) -> Result<Vault> {
        self.require_initialized()?;
        store::verify_mode(self.paths.root(), DIR_MODE)?;
        let vault = Vault::open(&self.paths.personal(), PERSONAL, &self.master_secret()?)?;
        Ok(vault.with_lock_timeout(self.settings.lock.timeout()))
    }

    /// Open the vault of `namespace`; `None` is the personal vault.
    fn open(&self, namespace: Option<&str>) -> Result<Vault> {
        let personal = self.open_personal()?;
        match namespace {
            None => Ok(personal),
            Some(team) => {
                drop(personal);
                self.open_team(&self.load_state()?, team)
            }
        }
    }

    fn mount<'s>(&self, state: &'s LocalState, team: &str) -> Result<&'s TeamMount> {
        state
            .teams
            .get(team)
            .ok_or_else(|| VaultError::NamespaceNotFound(team.to_string()).into())
    }

    /// Unseal the master key of `team`.
    fn team_secret(&self, state: &LocalState, team: &str) -> Result<SecretMaterial> {
        let mount = self.mount(state, team)?;
        let keyring = state.keyring.as_ref().ok_or_else(|| ConfigError::Parse {
            path: self.paths.local_state(),
            reason: format!("team '{}' is registered but the keyring is missing", team),
        })?;
        let sealed = crypto::decode_b64(&mount.sealed_key, "team key")?;
        let key = self.seal_key(keyring)?;
        let raw = crypto::decrypt(&key, &sealed, &format!("key of team '{}'", team))?;
        let text = zeroize::Zeroizing::new(String::from_utf8_lossy(&raw).into_owned());
        SecretMaterial::new(&text)
    }

    /// Key sealing team master keys, derived at most once per instance.
    fn seal_key(&self, keyring: &Keyring) -> Result<Key> {
        if let Some((salt, key)) = &*self.seal_cache.borrow() {
            if *salt == keyring.salt {
                return Ok(key.clone());
            }
        }
        let key = keyring.derive(&self.master_secret()?)?;
        *self.seal_cache.borrow_mut() = Some((keyring.salt.clone(), key.clone()));
        Ok(key)
    }

    fn open_team(&self, state: &LocalState, team: &str) -> Result<Vault> {
        let secret = self.team_secret(state, team)?;
        let vault = Vault::open(&self.mount(state, team)?.dir, team, &secret)?;
        Ok(vault.with_lock_timeout(self.settings.lock.timeout()))
    }

    fn skip_team(&self, team: &str, error: &crate::error::Error) {
        warn!(team = %team, error = %error, "team vault unavailable");
        self.warnings.borrow_mut().push(Warning::TeamUnavailable {
            team: team.to_string(),
            reason: error.to_string(),
        });
    }

    fn ensure_unregistered(&self, name: &str) -> Result<()> {
        if self.load_state()?.teams.contains_key(name) || self.paths.team(name).exists() {
            return Err(SyncError::TeamExists(name.to_string()).into());
        }
        Ok(())
    }

    fn register(&self, name: &str, url: &str, dir: &Path, master: &SecretMaterial) -> Result<()> {
        self.update_state(|state| {
            let keyring = state
                .keyring
                .get_or_insert_with(|| Keyring::generate(&self.settings.kdf));
            let sealed = crypto::encrypt(&self.seal_key(keyring)?, master.as_bytes())?;
            let mount = TeamMount {
                remote: url.to_string(),
                dir: dir.to_path_buf(),
                sealed_key: crypto::encode_b64(&sealed),
                joined_at: Utc::now(),
            };
            state.teams.insert(name.to_string(), mount);
            Ok(())
        })
    }

    fn load_state(&self) -> Result<LocalState> {
        LocalState::load(&self.paths.local_state())
    }

    /// Read-modify-write `local.toml` under the personal vault lock.
    fn update_state<R>(&self, change: impl FnOnce(&mut LocalState) -> Result<R>) -> Result<R> {
        let _guard = VaultLock::acquire(&self.paths.personal(), self.settings.lock.timeout())?;
        let path = self.paths.local_state();
        let mut state = LocalState::load(&path)?;
        let result = change(&mut state)?;
        state.save(&path)?;
        Ok(result)
    }

    /// Record an audit entry; failures become warnings.
    fn audit(&self, vault: &str, slug: &str, action: Action, exposed: bool) {
        let log = AuditLog::new(self.paths.audit_log(vault));
        if let Err(e) = log.record(&AuditEntry::new(slug, action, exposed)) {
            warn!(vault = %vault, error = %e, "audit write failed");
            self.warnings.borrow_mut().push(Warning::AuditFailed {
                vault: vault.to_string(),
                reason: e.to_string(),
            });
        }
    }
}

fn vault_info(vault: &Vault, remote: Option<String>) -> VaultInfo {
    VaultInfo {
        name: vault.name().to_string(),
        path: vault.dir().to_path_buf(),
        remote,
        profile_count: Some(vault.len()),
    }
}
