//! Input validation for keyswitch operations.
//!
//! Normalizes profile names into slugs and validates environment variable
//! names before they reach a vault or a child process.

use crate::core::constants::PERSONAL;
use crate::error::{Result, ValidationError};

/// Normalize a display name into a slug.
///
/// Lowercases, replaces every character outside `[a-z0-9-]` with a hyphen,
/// collapses hyphen runs and trims hyphens from both ends.
///
/// ```
/// use keyswitch::core::validation::slugify;
///
/// assert_eq!(slugify("  Work Account #2 "), "work-account-2");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars().flat_map(char::to_lowercase) {
        let ch = if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            ch
        } else {
            '-'
        };
        if ch == '-' && (slug.is_empty() || slug.ends_with('-')) {
            continue;
        }
        slug.push(ch);
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Validate that `slug` is already in normalized form.
///
/// # Errors
///
/// Returns `ValidationError::InvalidSlug` if it is empty or would change
/// under [`slugify`].
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() {
        return Err(ValidationError::InvalidSlug {
            name: slug.to_string(),
            reason: "cannot be empty".to_string(),
        }
        .into());
    }
    if slugify(slug) != slug {
        return Err(ValidationError::InvalidSlug {
            name: slug.to_string(),
            reason: "only lowercase letters, digits and single hyphens are allowed".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Validate a team name: a slug that is not the reserved personal namespace.
pub fn validate_team_name(name: &str) -> Result<()> {
    validate_slug(name)?;
    if name == PERSONAL {
        return Err(ValidationError::ReservedName(name.to_string()).into());
    }
    Ok(())
}

/// Validate an environment variable name.
///
/// Names must match `[A-Za-z_][A-Za-z0-9_]*`.
///
/// # Errors
///
/// Returns `ValidationError::InvalidEnvVar` describing the first problem.
pub fn validate_env_name(name: &str) -> Result<()> {
    let invalid = |reason: String| -> crate::error::Error {
        ValidationError::InvalidEnvVar {
            name: name.to_string(),
            reason,
        }
        .into()
    };

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("cannot be empty".to_string())),
        Some(first) if first.is_ascii_digit() => {
            return Err(invalid("cannot start with a digit".to_string()))
        }
        Some(_) => {}
    }

    for (i, ch) in name.chars().enumerate() {
        if !ch.is_ascii_alphanumeric() && ch != '_' {
            return Err(invalid(format!(
                "invalid character '{}' at position {}",
                ch,
                i + 1
            )));
        }
    }

    Ok(())
}
