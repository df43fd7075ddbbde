//! Type aliases for domain concepts.
//!
//! Provides semantic type aliases to make function signatures more descriptive.

/// A normalized profile identifier (lowercase ASCII, digits and hyphens).
pub type Slug = String;

/// Opaque per-write revision id of a profile record.
///
/// Changes on every write; used by the sync merge to detect edits.
pub type Revision = String;

/// A team vault name. Also the namespace prefix of its profiles.
pub type TeamName = String;

/// An environment variable name.
pub type EnvName = String;
