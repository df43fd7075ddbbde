//! Add command - store a new credential profile.

use crate::cli::output;
use crate::core::domain::{Credential, Profile};
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// Arguments of `keyswitch add`, as parsed.
#[derive(Debug, Default)]
pub struct NewProfile {
    pub name: String,
    pub email: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub env: Vec<(String, String)>,
    pub tags: Vec<String>,
    pub team: Option<String>,
}

impl NewProfile {
    /// Build the profile. An API key wins over OAuth tokens; with neither
    /// the profile only carries extra variables.
    pub fn build(self) -> Result<Profile> {
        let credential = match (self.api_key, self.access_token) {
            (Some(key), _) => Credential::api_key(key),
            (None, Some(access_token)) => Credential::OAuth {
                access_token,
                refresh_token: self.refresh_token,
                id_token: None,
                expires_at: None,
            },
            (None, None) => Credential::Env,
        };

        let mut profile = Profile::new(&self.name, credential)?;
        if let Some(email) = self.email {
            profile = profile.with_email(email);
        }
        for tag in self.tags {
            profile = profile.with_tag(tag);
        }
        for (name, value) in self.env {
            profile = profile.with_env(name, value);
        }
        if let Some(team) = self.team {
            profile = profile.in_namespace(team);
        }
        profile.validate()?;
        Ok(profile)
    }
}

/// Add a profile.
///
/// # Arguments
///
/// * `ks` - Keyswitch instance
/// * `new` - Parsed profile fields
/// * `force` - Replace an existing profile with the same slug
pub fn execute(ks: &Keyswitch, new: NewProfile, force: bool) -> Result<i32> {
    let profile = new.build()?;
    let meta = ks.add(profile, force)?;

    output::success(&format!(
        "added {} ({})",
        output::profile(&meta.qualified_slug()),
        meta.kind
    ));
    if !meta.env_names.is_empty() {
        output::kv("env", meta.env_names.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    Ok(0)
}
