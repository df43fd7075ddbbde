//! Profile inspection commands: get, list, remove.

use crate::cli::output;
use crate::core::domain::QualifiedSlug;
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// Show one profile. Secrets stay masked unless `unmask`.
pub fn get(ks: &Keyswitch, target: &str, unmask: bool, json: bool) -> Result<i32> {
    let target: QualifiedSlug = target.parse()?;
    let view = ks.get(&target, unmask)?;

    if json {
        output::data(&serde_json::to_string_pretty(&view)?);
        return Ok(0);
    }

    output::blank();
    output::header(&format!("{} ({})", output::profile(&target.to_string()), view.kind));
    output::rule();
    output::kv("name", &view.name);
    if let Some(email) = &view.email {
        output::kv("email", email);
    }
    for (field, value) in &view.secrets {
        output::kv(field, value);
    }
    if let Some(expires) = view.expires_at {
        output::kv("expires", expires.to_rfc3339());
    }
    if !view.tags.is_empty() {
        output::kv("tags", view.tags.join(", "));
    }
    for (name, value) in &view.env {
        output::kv(name, value);
    }
    output::kv("modified", view.modified_at.to_rfc3339());
    if view.masked {
        output::blank();
        output::dimmed("secrets masked; use --unmask to reveal");
    }
    Ok(0)
}

/// List profiles of every accessible vault.
pub fn list(ks: &Keyswitch, tag: Option<&str>, json: bool) -> Result<i32> {
    let profiles = ks.list(tag)?;

    if json {
        let profiles_json: Vec<_> = profiles
            .iter()
            .map(|meta| {
                serde_json::json!({
                    "slug": meta.qualified_slug(),
                    "name": meta.name,
                    "email": meta.email,
                    "kind": meta.kind,
                    "team": meta.namespace,
                    "tags": meta.tags,
                    "env": meta.env_names,
                    "modified_at": meta.modified_at,
                })
            })
            .collect();
        let result = serde_json::json!({
            "profiles": profiles_json,
            "count": profiles.len()
        });
        output::data(&serde_json::to_string_pretty(&result)?);
    } else if profiles.is_empty() {
        output::dimmed("no profiles");
    } else {
        output::blank();
        output::header(&format!("{} profiles", output::count(profiles.len())));
        output::rule();
        for meta in &profiles {
            let mut detail = meta.kind.to_string();
            if let Some(email) = &meta.email {
                detail = format!("{}  {}", detail, email);
            }
            if !meta.tags.is_empty() {
                let tags: Vec<_> = meta.tags.iter().map(|t| format!("#{}", t)).collect();
                detail = format!("{}  {}", detail, tags.join(" "));
            }
            output::kv(&meta.qualified_slug(), detail);
        }
    }
    Ok(0)
}

/// Delete a profile.
pub fn remove(ks: &Keyswitch, target: &str) -> Result<i32> {
    let target: QualifiedSlug = target.parse()?;
    ks.remove(&target)?;
    output::success(&format!("removed {}", output::profile(&target.to_string())));
    Ok(0)
}
