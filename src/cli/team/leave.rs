//! Team leave command.

use crate::cli::output;
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// Forget a team and delete its local copy.
pub fn execute(ks: &Keyswitch, name: &str) -> Result<i32> {
    ks.team_leave(name)?;
    output::success(&format!("left team {}", output::profile(name)));
    Ok(0)
}
