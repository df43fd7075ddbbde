//! Team create command.

use crate::cli::output;
use crate::core::crypto::SecretMaterial;
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// Create and publish a team vault.
///
/// Without `master_key` a fresh key is generated and printed once; it is
/// what other members need to join.
pub fn execute(ks: &Keyswitch, name: &str, url: &str, master_key: Option<&str>) -> Result<i32> {
    let (master, generated) = match master_key {
        Some(text) => (SecretMaterial::new(text)?, false),
        None => (SecretMaterial::generate(), true),
    };
    let info = ks.team_create(name, url, &master)?;

    output::success(&format!(
        "created team {} at {}",
        output::profile(&info.name),
        output::path(url)
    ));
    if generated {
        output::blank();
        output::kv("team key", master.expose().as_str());
        output::hint("share this key with members over a secure channel; it is not shown again");
    }
    Ok(0)
}
