//! Audit types.
//!
//! Entries record that a credential was touched, never what it contains:
//! the only fields are a timestamp, the profile slug, the action and whether
//! plaintext left the vault.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Profile was read with `get`.
    Read,
    /// Profile became the global active identity.
    Switch,
    /// Credentials were injected into a child process.
    Inject,
    /// Vault was pushed or pulled.
    Sync,
    /// Profile was created or changed.
    Modify,
    /// Profile was removed.
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Read => "read",
            Action::Switch => "switch",
            Action::Inject => "inject",
            Action::Sync => "sync",
            Action::Modify => "modify",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// Qualified slug, or the vault name for sync events.
    pub slug: String,
    pub action: Action,
    /// Whether plaintext credential material left the vault.
    pub exposed: bool,
}

impl AuditEntry {
    pub fn new(slug: impl Into<String>, action: Action, exposed: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            slug: slug.into(),
            action,
            exposed,
        }
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<7} {}{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.action,
            self.slug,
            if self.exposed { " (exposed)" } else { "" }
        )
    }
}

/// Query filter for the audit log.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub slug: Option<String>,
    pub action: Option<Action>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `entry` passes every predicate except the limit.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.slug.as_deref().map_or(true, |s| entry.slug == s)
            && self.action.map_or(true, |a| entry.action == a)
            && self.since.map_or(true, |t| entry.timestamp >= t)
    }
}
