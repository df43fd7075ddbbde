//! Profile types.
//!
//! A [`Profile`] is one identity's full credential set. Its secret parts are
//! only ever held decrypted in memory and are zeroized on drop. The vault
//! index carries the non-secret projection, [`ProfileMeta`], so listing never
//! needs to decrypt a credential.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::core::constants::{ENCRYPTED_EXT, PERSONAL};
use crate::core::types::{EnvName, Revision, Slug, TeamName};
use crate::core::validation::{slugify, validate_env_name, validate_slug};
use crate::error::{Error, Result, ValidationError};

/// The kind of primary credential a profile carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    ApiKey,
    #[serde(rename = "oauth")]
    OAuth,
    Env,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKind::ApiKey => write!(f, "api_key"),
            CredentialKind::OAuth => write!(f, "oauth"),
            CredentialKind::Env => write!(f, "env"),
        }
    }
}

/// The primary credential of a profile.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credential {
    /// A static API key.
    ApiKey { key: String },
    /// An OAuth token set.
    #[serde(rename = "oauth")]
    OAuth {
        access_token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        refresh_token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id_token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_at: Option<DateTime<Utc>>,
    },
    /// No primary credential; the profile only carries extra variables.
    Env,
}

impl Credential {
    /// Create an API key credential.
    pub fn api_key(key: impl Into<String>) -> Self {
        Credential::ApiKey { key: key.into() }
    }

    /// Create an OAuth credential with only an access token.
    pub fn oauth(access_token: impl Into<String>) -> Self {
        Credential::OAuth {
            access_token: access_token.into(),
            refresh_token: None,
            id_token: None,
            expires_at: None,
        }
    }

    /// The credential's kind.
    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::ApiKey { .. } => CredentialKind::ApiKey,
            Credential::OAuth { .. } => CredentialKind::OAuth,
            Credential::Env => CredentialKind::Env,
        }
    }

    /// Named secret fields, in display order.
    pub fn secrets(&self) -> Vec<(&'static str, &str)> {
        match self {
            Credential::ApiKey { key } => vec![("api_key", key.as_str())],
            Credential::OAuth {
                access_token,
                refresh_token,
                id_token,
                ..
            } => {
                let mut fields = vec![("access_token", access_token.as_str())];
                if let Some(token) = refresh_token {
                    fields.push(("refresh_token", token.as_str()));
                }
                if let Some(token) = id_token {
                    fields.push(("id_token", token.as_str()));
                }
                fields
            }
            Credential::Env => Vec::new(),
        }
    }

    fn validate(&self) -> Result<()> {
        let empty = match self {
            Credential::ApiKey { key } => key.trim().is_empty().then_some("api key"),
            Credential::OAuth { access_token, .. } => {
                access_token.trim().is_empty().then_some("access token")
            }
            Credential::Env => None,
        };
        match empty {
            Some(what) => Err(ValidationError::EmptyCredential(format!("{} is empty", what)).into()),
            None => Ok(()),
        }
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        match self {
            Credential::ApiKey { key } => key.zeroize(),
            Credential::OAuth {
                access_token,
                refresh_token,
                id_token,
                ..
            } => {
                access_token.zeroize();
                refresh_token.zeroize();
                id_token.zeroize();
            }
            Credential::Env => {}
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("kind", &self.kind())
            .field("secrets", &"[REDACTED]")
            .finish()
    }
}

/// A complete decrypted profile.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub slug: Slug,
    /// Display name as entered by the user.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub credential: Credential,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Extra environment variables injected alongside the credential.
    #[serde(default)]
    pub env: BTreeMap<EnvName, String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Team vault this profile lives in; `None` for the personal vault.
    #[serde(skip)]
    pub namespace: Option<TeamName>,
}

impl Profile {
    /// Create a profile, deriving its slug from `name`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidSlug` if `name` has no usable
    /// characters.
    pub fn new(name: &str, credential: Credential) -> Result<Self> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(ValidationError::InvalidSlug {
                name: name.to_string(),
                reason: "contains no letters or digits".to_string(),
            }
            .into());
        }
        let now = Utc::now();
        Ok(Self {
            slug,
            name: name.trim().to_string(),
            email: None,
            credential,
            tags: BTreeSet::new(),
            env: BTreeMap::new(),
            created_at: now,
            modified_at: now,
            namespace: None,
        })
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Place the profile in a team namespace.
    pub fn in_namespace(mut self, team: impl Into<String>) -> Self {
        self.namespace = Some(team.into());
        self
    }

    /// Check the profile can be stored.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for a bad slug, an empty primary credential,
    /// an invalid variable name, or an env-only profile without variables.
    pub fn validate(&self) -> Result<()> {
        validate_slug(&self.slug)?;
        self.credential.validate()?;
        for name in self.env.keys() {
            validate_env_name(name)?;
        }
        if self.credential.kind() == CredentialKind::Env && self.env.is_empty() {
            return Err(ValidationError::EmptyCredential(
                "profile has neither a credential nor environment variables".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Slug including the team prefix, e.g. `acme/deploy`.
    pub fn qualified_slug(&self) -> String {
        qualify(self.namespace.as_deref(), &self.slug)
    }

    /// Render for display, masking secrets unless `unmasked`.
    pub fn view(&self, unmasked: bool) -> ProfileView {
        let reveal = |value: &str| {
            if unmasked {
                value.to_string()
            } else {
                mask(value)
            }
        };
        let expires_at = match &self.credential {
            Credential::OAuth { expires_at, .. } => *expires_at,
            _ => None,
        };
        ProfileView {
            slug: self.qualified_slug(),
            name: self.name.clone(),
            email: self.email.clone(),
            kind: self.credential.kind(),
            secrets: self
                .credential
                .secrets()
                .into_iter()
                .map(|(field, value)| (field.to_string(), reveal(value)))
                .collect(),
            expires_at,
            tags: self.tags.iter().cloned().collect(),
            env: self
                .env
                .iter()
                .map(|(k, v)| (k.clone(), reveal(v)))
                .collect(),
            masked: !unmasked,
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }
}

impl Drop for Profile {
    fn drop(&mut self) {
        for value in self.env.values_mut() {
            value.zeroize();
        }
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("slug", &self.qualified_slug())
            .field("kind", &self.credential.kind())
            .field("tags", &self.tags)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Non-secret metadata about a stored profile, kept in the vault index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMeta {
    pub slug: Slug,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub kind: CredentialKind,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub env_names: BTreeSet<EnvName>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Changes on every write of the record.
    pub revision: Revision,
    #[serde(skip)]
    pub namespace: Option<TeamName>,
}

impl ProfileMeta {
    /// Project a profile onto its index entry.
    pub fn describe(profile: &Profile, revision: Revision) -> Self {
        Self {
            slug: profile.slug.clone(),
            name: profile.name.clone(),
            email: profile.email.clone(),
            kind: profile.credential.kind(),
            tags: profile.tags.clone(),
            env_names: profile.env.keys().cloned().collect(),
            created_at: profile.created_at,
            modified_at: profile.modified_at,
            revision,
            namespace: profile.namespace.clone(),
        }
    }

    /// Slug including the team prefix.
    pub fn qualified_slug(&self) -> String {
        qualify(self.namespace.as_deref(), &self.slug)
    }

    /// File name of the encrypted record for this revision.
    pub fn blob_name(&self) -> String {
        format!("{}.{}.{}", self.slug, self.revision, ENCRYPTED_EXT)
    }

    /// Last-writer-wins ordering: later `modified_at`, then higher revision.
    pub fn supersedes(&self, other: &ProfileMeta) -> bool {
        (self.modified_at, &self.revision) > (other.modified_at, &other.revision)
    }
}

/// Display form of a profile, with secrets masked unless requested.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub slug: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub kind: CredentialKind,
    pub secrets: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub masked: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Drop for ProfileView {
    fn drop(&mut self) {
        for value in self.secrets.values_mut().chain(self.env.values_mut()) {
            value.zeroize();
        }
    }
}

/// Mask a secret for display.
///
/// Long values keep four characters at each end, medium values keep two at
/// the start, short values are hidden entirely.
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    match chars.len() {
        n if n > 12 => format!(
            "{}...{}",
            chars[..4].iter().collect::<String>(),
            chars[n - 4..].iter().collect::<String>()
        ),
        n if n > 4 => format!("{}...", chars[..2].iter().collect::<String>()),
        _ => "****".to_string(),
    }
}

/// A profile reference, optionally prefixed by its team: `slug` or `team/slug`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedSlug {
    pub namespace: Option<TeamName>,
    pub slug: Slug,
}

impl QualifiedSlug {
    pub fn personal(slug: impl Into<String>) -> Self {
        Self {
            namespace: None,
            slug: slug.into(),
        }
    }
}

impl FromStr for QualifiedSlug {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (namespace, slug) = match s.trim().split_once('/') {
            Some((ns, slug)) => (Some(ns), slug),
            None => (None, s.trim()),
        };
        let namespace = match namespace {
            None | Some(PERSONAL) => None,
            Some(ns) => {
                validate_slug(ns)?;
                Some(ns.to_string())
            }
        };
        let normalized = slugify(slug);
        if normalized.is_empty() {
            return Err(ValidationError::InvalidSlug {
                name: s.to_string(),
                reason: "missing profile name".to_string(),
            }
            .into());
        }
        Ok(Self {
            namespace,
            slug: normalized,
        })
    }
}

impl fmt::Display for QualifiedSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&qualify(self.namespace.as_deref(), &self.slug))
    }
}

fn qualify(namespace: Option<&str>, slug: &str) -> String {
    match namespace {
        Some(ns) => format!("{}/{}", ns, slug),
        None => slug.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_derives_slug() {
        let profile = Profile::new("Work Account", Credential::api_key("sk-1")).unwrap();
        assert_eq!(profile.slug, "work-account");
        assert_eq!(profile.name, "Work Account");
        assert!(Profile::new("***", Credential::api_key("sk-1")).is_err());
    }

    #[test]
    fn test_credential_serializes_with_kind_tag() {
        let json = serde_json::to_value(Credential::oauth("at")).unwrap();
        assert_eq!(json["kind"], "oauth");
        assert_eq!(json["access_token"], "at");
        assert!(json.get("refresh_token").is_none());

        let back: Credential = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), CredentialKind::OAuth);

        let env: Credential = serde_json::from_str(r#"{"kind":"env"}"#).unwrap();
        assert_eq!(env.kind(), CredentialKind::Env);
    }

    #[test]
    fn test_validate_rejects_empty_profiles() {
        let empty_key = Profile::new("a", Credential::api_key("  ")).unwrap();
        assert!(empty_key.validate().is_err());

        let env_only = Profile::new("b", Credential::Env).unwrap();
        assert!(env_only.validate().is_err());
        assert!(env_only.with_env("OPENAI_BASE_URL", "x").validate().is_ok());

        let bad_var = Profile::new("c", Credential::api_key("k")).unwrap().with_env("NOT-OK", "x");
        assert!(bad_var.validate().is_err());
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("sk-proj-abcdefghijkl"), "sk-p...ijkl");
        assert_eq!(mask("abcdefg"), "ab...");
        assert_eq!(mask("abc"), "****");
        assert_eq!(mask(""), "****");
    }

    #[test]
    fn test_view_masks_unless_requested() {
        let profile = Profile::new("work", Credential::api_key("sk-live-0123456789abcdef"))
            .unwrap()
            .with_env("EXTRA_TOKEN", "tok-0123456789abcdef");

        let masked = profile.view(false);
        assert!(masked.masked);
        assert_eq!(masked.secrets["api_key"], "sk-l...cdef");
        assert_eq!(masked.env["EXTRA_TOKEN"], "tok-...cdef");

        let clear = profile.view(true);
        assert_eq!(clear.secrets["api_key"], "sk-live-0123456789abcdef");
    }

    #[test]
    fn test_debug_never_prints_secrets() {
        let profile = Profile::new("work", Credential::api_key("sk-live-secret"))
            .unwrap()
            .with_env("A", "env-secret");
        let debug = format!("{:?}", profile);
        assert!(!debug.contains("sk-live-secret"));
        assert!(!debug.contains("env-secret"));
    }

    #[test]
    fn test_qualified_slug_parsing() {
        let q: QualifiedSlug = "acme/Deploy Bot".parse().unwrap();
        assert_eq!(q.namespace.as_deref(), Some("acme"));
        assert_eq!(q.slug, "deploy-bot");
        assert_eq!(q.to_string(), "acme/deploy-bot");

        let q: QualifiedSlug = "personal/work".parse().unwrap();
        assert_eq!(q, QualifiedSlug::personal("work"));

        assert!("acme/".parse::<QualifiedSlug>().is_err());
        assert!("Bad Team/x".parse::<QualifiedSlug>().is_err());
    }

    #[test]
    fn test_meta_supersedes_by_time_then_revision() {
        let profile = Profile::new("a", Credential::api_key("k")).unwrap();
        let older = ProfileMeta::describe(&profile, "0001".into());
        let mut newer = ProfileMeta::describe(&profile, "0000".into());
        newer.modified_at = older.modified_at + chrono::Duration::seconds(1);

        assert!(newer.supersedes(&older));
        assert!(!older.supersedes(&newer));

        let tie = ProfileMeta::describe(&profile, "0002".into());
        assert!(tie.supersedes(&older));
        assert_eq!(older.blob_name(), "a.0001.enc");
    }
}
