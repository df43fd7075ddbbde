//! Audit command - show the access log.

use crate::cli::output;
use crate::core::domain::{Action, AuditFilter};
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// Print audit entries, newest first.
pub fn execute(
    ks: &Keyswitch,
    profile: Option<String>,
    action: Option<Action>,
    limit: usize,
    json: bool,
) -> Result<i32> {
    let mut filter = AuditFilter::default().limit(limit);
    if let Some(slug) = profile {
        filter = filter.slug(slug);
    }
    if let Some(action) = action {
        filter = filter.action(action);
    }
    let entries: Vec<_> = ks.audit_query(&filter)?.collect();

    if json {
        output::data(&serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        output::dimmed("no audit entries");
    } else {
        for entry in &entries {
            output::data(&entry.to_string());
        }
    }
    Ok(0)
}
