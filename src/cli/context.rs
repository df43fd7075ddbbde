//! Context commands - link directories to profiles.

use std::path::PathBuf;

use crate::cli::{output, working_dir};
use crate::core::domain::QualifiedSlug;
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// Link a directory to a profile.
pub fn set(ks: &Keyswitch, target: &str, dir: Option<PathBuf>) -> Result<i32> {
    let target: QualifiedSlug = target.parse()?;
    let linked = ks.context_set(&working_dir(dir)?, &target)?;
    output::success(&format!(
        "linked {} to {}",
        output::path(linked.display()),
        output::profile(&target.to_string())
    ));
    Ok(0)
}

/// Remove the link on a directory.
pub fn unset(ks: &Keyswitch, dir: Option<PathBuf>) -> Result<i32> {
    let dir = working_dir(dir)?;
    if ks.context_unset(&dir)? {
        output::success(&format!("unlinked {}", output::path(dir.display())));
    } else {
        output::dimmed(&format!("{} is not linked", dir.display()));
    }
    Ok(0)
}
