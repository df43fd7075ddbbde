//! Init command - create the keyswitch root and personal vault.

use tracing::info;

use crate::cli::output;
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// Initialize keyswitch.
pub fn execute(ks: &Keyswitch) -> Result<i32> {
    let report = ks.init()?;
    info!(root = %report.root.display(), "initialized");

    output::success(&format!("initialized {}", output::path(report.root.display())));
    match report.master_key_file {
        Some(path) => {
            output::kv("master key", output::path(path.display()));
            output::hint("back this file up; profiles cannot be recovered without it");
        }
        None => output::kv("master key", "from environment"),
    }
    Ok(0)
}
