//! Vault information for listing teams.

use std::path::PathBuf;

use serde::Serialize;

/// Information about a mounted vault.
#[derive(Debug, Clone, Serialize)]
pub struct VaultInfo {
    /// Vault name ("personal" or the team name)
    pub name: String,
    /// Vault directory
    pub path: PathBuf,
    /// Sync remote, if configured
    pub remote: Option<String>,
    /// Number of profiles, when the vault could be opened
    pub profile_count: Option<usize>,
}

impl VaultInfo {
    /// Whether the stored master key still opens the vault.
    pub fn accessible(&self) -> bool {
        self.profile_count.is_some()
    }
}
