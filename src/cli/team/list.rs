//! Team list command.

use crate::cli::output;
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// List joined teams.
pub fn execute(ks: &Keyswitch, json: bool) -> Result<i32> {
    let teams = ks.team_list()?;

    if json {
        let result = serde_json::json!({
            "teams": teams,
            "count": teams.len()
        });
        output::data(&serde_json::to_string_pretty(&result)?);
    } else if teams.is_empty() {
        output::dimmed("no teams joined");
    } else {
        output::blank();
        output::header(&format!("{} teams", output::count(teams.len())));
        output::rule();
        for team in &teams {
            let profiles = if team.accessible() {
                format!("{} profiles", team.profile_count.unwrap_or(0))
            } else {
                "unavailable".to_string()
            };
            let remote = team.remote.as_deref().unwrap_or("-");
            output::kv(&team.name, format!("{}  {}", profiles, remote));
        }
    }
    Ok(0)
}
