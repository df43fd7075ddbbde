//! Test fixtures and constants.

/// Settings with cheap Argon2id parameters so tests stay fast.
pub const FAST_SETTINGS: &str = "[kdf]\nmemory_kib = 8\niterations = 1\nparallelism = 1\n";

/// An API key long enough to be masked as prefix...suffix.
pub const WORK_KEY: &str = "sk-work-0123456789abcdef";

/// A second API key.
pub const HOME_KEY: &str = "sk-home-fedcba9876543210";

/// Variable the active API key is injected into by default.
pub const API_KEY_VAR: &str = "CODEX_API_KEY";
