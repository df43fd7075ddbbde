//! Sync commands - share a vault through a git remote.

use crate::cli::output;
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

fn label(team: Option<&str>) -> String {
    team.map(|t| format!("team '{}'", t))
        .unwrap_or_else(|| "personal vault".to_string())
}

/// Configure the remote.
pub fn init(ks: &Keyswitch, url: &str, team: Option<&str>) -> Result<i32> {
    ks.sync_init(url, team)?;
    output::success(&format!("{} syncs with {}", label(team), output::path(url)));
    Ok(0)
}

/// Commit local changes and push.
pub fn push(ks: &Keyswitch, team: Option<&str>) -> Result<i32> {
    let report = ks.sync_push(team)?;
    let what = if report.committed {
        "committed and pushed"
    } else {
        "pushed"
    };
    output::success(&format!("{} {} ({})", what, label(team), report.head));
    Ok(0)
}

/// Fetch and merge remote changes.
pub fn pull(ks: &Keyswitch, team: Option<&str>) -> Result<i32> {
    let report = ks.sync_pull(team)?;
    if report.is_empty() {
        output::success(&format!("{} is up to date", label(team)));
        return Ok(0);
    }

    output::success(&format!("pulled {}", label(team)));
    for slug in &report.added {
        output::list_item(&format!("added {}", output::profile(slug)));
    }
    for slug in &report.updated {
        output::list_item(&format!("updated {}", output::profile(slug)));
    }
    for slug in &report.removed {
        output::list_item(&format!("removed {}", output::profile(slug)));
    }
    for conflict in &report.conflicts {
        output::warn(&conflict.to_string());
    }
    Ok(0)
}
