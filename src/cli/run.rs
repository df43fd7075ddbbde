//! Run command - execute a program with the active profile injected.

use tracing::debug;

use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// Run `command` and return its exit code.
///
/// Nothing is printed on stdout so the child's output passes through
/// untouched.
pub fn execute(ks: &Keyswitch, command: &[String], overrides: &[(String, String)]) -> Result<i32> {
    let cwd = std::env::current_dir()?;
    debug!(program = ?command.first(), overrides = overrides.len(), "run");
    ks.run(command, &cwd, overrides)
}
