//! Constants used throughout keyswitch.
//!
//! Centralizes file names, environment variables and defaults.

/// Default root directory relative to HOME (~/.keyswitch).
pub const ROOT_DIR: &str = ".keyswitch";

/// Overrides the root directory.
pub const HOME_ENV: &str = "KEYSWITCH_HOME";

/// Session-level profile override, read fresh on every resolution.
pub const SESSION_ENV: &str = "KEYSWITCH_PROFILE";

/// Supplies the personal master key instead of the key file.
pub const MASTER_KEY_ENV: &str = "KEYSWITCH_MASTER_KEY";

/// Log filter for the binary.
pub const LOG_ENV: &str = "KEYSWITCH_LOG";

/// Name of the personal vault. Reserved; no team may use it.
pub const PERSONAL: &str = "personal";

/// Master key file under the root (never synced).
pub const MASTER_KEY_FILE: &str = "master.key";

/// User settings file under the root.
pub const SETTINGS_FILE: &str = "settings.toml";

/// Directory holding per-vault audit logs.
pub const AUDIT_DIR: &str = "audit";

/// Directory holding joined team vaults.
pub const TEAMS_DIR: &str = "teams";

/// Vault header (KDF parameters, salt, wrapped content key).
pub const HEADER_FILE: &str = "vault.toml";

/// Encrypted profile index.
pub const INDEX_FILE: &str = "index.enc";

/// Directory of encrypted profile blobs.
pub const PROFILES_DIR: &str = "profiles";

/// Advisory lock file inside each vault directory.
pub const LOCK_FILE: &str = ".lock";

/// Machine-local state: active profile, directory links, team mounts.
pub const LOCAL_STATE_FILE: &str = "local.toml";

/// Extension of encrypted files.
pub const ENCRYPTED_EXT: &str = "enc";

/// Extension of in-flight atomic writes.
pub const TMP_EXT: &str = "tmp";

/// On-disk vault format version.
pub const FORMAT_VERSION: u32 = 1;

/// Patterns kept out of version control in every vault repository.
pub const SYNC_EXCLUDES: &[&str] = &[LOCAL_STATE_FILE, LOCK_FILE, "*.tmp"];

/// Default branch used for sync.
pub const DEFAULT_BRANCH: &str = "main";

/// Default lock acquisition timeout in milliseconds.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Primary injected variable for API key credentials.
pub const DEFAULT_API_KEY_VAR: &str = "CODEX_API_KEY";

/// Primary injected variable for OAuth access tokens.
pub const DEFAULT_ACCESS_TOKEN_VAR: &str = "CODEX_ACCESS_TOKEN";

/// Injected variable for OAuth refresh tokens.
pub const DEFAULT_REFRESH_TOKEN_VAR: &str = "CODEX_REFRESH_TOKEN";

/// Variable carrying the resolved profile slug into child processes.
pub const PROFILE_NAME_VAR: &str = "KEYSWITCH_ACTIVE_PROFILE";
