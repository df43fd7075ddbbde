//! Identity commands: switch, status, resolve.

use crate::cli::output;
use crate::core::domain::QualifiedSlug;
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// Make a profile globally active.
pub fn switch(ks: &Keyswitch, target: &str) -> Result<i32> {
    let target: QualifiedSlug = target.parse()?;
    let meta = ks.switch(&target)?;
    output::success(&format!(
        "switched to {} ({})",
        output::profile(&target.to_string()),
        meta.name
    ));
    Ok(0)
}

/// Show which profile is active here and why.
pub fn status(ks: &Keyswitch, json: bool) -> Result<i32> {
    let cwd = std::env::current_dir()?;
    let resolved = ks.status(&cwd)?;

    if json {
        let result = serde_json::json!({
            "active": resolved,
            "root": ks.paths().root(),
        });
        output::data(&serde_json::to_string_pretty(&result)?);
        return Ok(0);
    }

    output::section("Keyswitch Status");
    output::kv("root", output::path(ks.paths().root().display()));
    match resolved {
        Some(resolved) => {
            output::kv("active", output::profile(&resolved.slug));
            output::kv("from", resolved.layer);
        }
        None => {
            output::kv("active", "none");
            output::blank();
            output::hint("keyswitch switch <profile>");
        }
    }
    Ok(0)
}

/// Print only the active slug, for shell prompts and scripts.
///
/// Exits 1 without output when nothing is active.
pub fn resolve(ks: &Keyswitch) -> Result<i32> {
    let cwd = std::env::current_dir()?;
    match ks.resolve(&cwd)? {
        Some(resolved) => {
            output::data(&resolved.slug);
            Ok(0)
        }
        None => Ok(1),
    }
}
