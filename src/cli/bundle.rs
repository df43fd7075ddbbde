//! Export and import of encrypted bundles.

use std::path::Path;

use crate::cli::output;
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// Write the personal vault to a bundle.
pub fn export(ks: &Keyswitch, path: &Path) -> Result<i32> {
    let count = ks.export(path)?;
    output::success(&format!(
        "exported {} profiles to {}",
        output::count(count),
        output::path(path.display())
    ));
    Ok(0)
}

/// Merge a bundle into the personal vault.
pub fn import(ks: &Keyswitch, path: &Path, force: bool) -> Result<i32> {
    let report = ks.import(path, force)?;
    output::success(&format!(
        "imported {} profiles from {}",
        output::count(report.imported.len()),
        output::path(path.display())
    ));
    for slug in &report.imported {
        output::list_item(&output::profile(slug));
    }
    if !report.skipped.is_empty() {
        output::warn(&format!(
            "skipped existing: {}",
            report.skipped.join(", ")
        ));
        output::hint("use --force to replace them");
    }
    Ok(0)
}
