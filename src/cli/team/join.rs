//! Team join command.

use crate::cli::output;
use crate::core::crypto::SecretMaterial;
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// Clone and unlock a team vault.
pub fn execute(ks: &Keyswitch, name: &str, url: &str, master_key: &str) -> Result<i32> {
    let master = SecretMaterial::new(master_key)?;
    let info = ks.team_join(name, url, &master)?;
    output::success(&format!(
        "joined team {} ({} profiles)",
        output::profile(&info.name),
        output::count(info.profile_count.unwrap_or(0))
    ));
    Ok(0)
}
