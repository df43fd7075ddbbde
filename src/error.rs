//! Error types for keyswitch.
//!
//! Each subsystem owns a focused error enum; all of them convert into the
//! top-level [`Error`] so callers can use `?` across module boundaries.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration and on-disk layout errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("vault not initialized at {}", path.display())]
    NotInitialized { path: PathBuf },

    #[error("vault already initialized at {}", path.display())]
    AlreadyInitialized { path: PathBuf },

    #[error("insecure permissions on {}: mode {mode}", path.display())]
    InsecurePermissions { path: PathBuf, mode: String },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("failed to serialize {what}: {reason}")]
    Serialize { what: &'static str, reason: String },

    #[error("master key not found: set KEYSWITCH_MASTER_KEY or run `keyswitch init`")]
    MissingMasterKey,

    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting { field: String, reason: String },

    #[error("unsupported vault format version {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    #[error("unable to determine home directory")]
    NoHomeDirectory,
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid profile name '{name}': {reason}")]
    InvalidSlug { name: String, reason: String },

    #[error("profile '{slug}' already exists (use --force to replace)")]
    DuplicateSlug { slug: String },

    #[error("invalid environment variable name '{name}': {reason}")]
    InvalidEnvVar { name: String, reason: String },

    #[error("credential is empty: {0}")]
    EmptyCredential(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("'{0}' is a reserved name")]
    ReservedName(String),

    #[error("no value given for '{0}'")]
    MissingValue(String),
}

/// Cryptographic failures.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("authentication failed for {context}: data was tampered with or the key is wrong")]
    Authentication { context: String },

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("ciphertext too short: {len} bytes (minimum {min})")]
    CiphertextTooShort { len: usize, min: usize },

    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),
}

/// Vault store errors.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("wrong master key for vault '{vault}'")]
    WrongKey { vault: String },

    #[error("profile not found: {slug}")]
    ProfileNotFound { slug: String },

    #[error("unknown namespace '{0}'")]
    NamespaceNotFound(String),

    #[error("profile '{slug}' is corrupt: {reason}")]
    CorruptRecord { slug: String, reason: String },

    #[error("vault at {} is locked by another process (waited {waited_ms}ms)", path.display())]
    Locked { path: PathBuf, waited_ms: u64 },
}

/// Identity context errors.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no active identity: run `keyswitch switch <profile>` or set KEYSWITCH_PROFILE")]
    NoActiveIdentity,

    #[error("cannot link {}: {source}", path.display())]
    InvalidDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Audit log errors.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to write audit log {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read audit log {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Injection proxy errors.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no command specified")]
    EmptyCommand,

    #[error("command not found: {program}")]
    CommandNotFound { program: String },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Sync engine errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync is not configured for '{0}': run `keyswitch sync init <url>`")]
    NotConfigured(String),

    #[error("git executable not found on PATH")]
    GitUnavailable,

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("remote has diverged: pull before pushing")]
    Diverged,

    #[error("invalid master key for team '{team}'")]
    InvalidMasterKey { team: String },

    #[error("team '{0}' already exists")]
    TeamExists(String),

    #[error("remote for team '{team}' is not a keyswitch vault")]
    NotAVault { team: String },

    #[error("invalid bundle: {0}")]
    BundleFormat(String),
}

/// Result type alias for keyswitch operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// A follow-up command worth suggesting to the user, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::Config(ConfigError::NotInitialized { .. }) => Some("run: keyswitch init"),
            Error::Config(ConfigError::MissingMasterKey) => Some("run: keyswitch init"),
            Error::Config(ConfigError::InsecurePermissions { .. }) => {
                Some("restrict the path with chmod 700 (directories) or chmod 600 (files)")
            }
            Error::Context(ContextError::NoActiveIdentity) => Some("run: keyswitch switch <profile>"),
            Error::Vault(VaultError::ProfileNotFound { .. }) => Some("run: keyswitch list"),
            Error::Sync(SyncError::Diverged) => Some("run: keyswitch sync pull"),
            Error::Validation(ValidationError::MissingValue(_)) => {
                Some("pipe the value on stdin or set KEYSWITCH_ENV_VALUE")
            }
            _ => None,
        }
    }

    /// Whether this error is a failed authentication check.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Crypto(CryptoError::Authentication { .. }))
    }
}
