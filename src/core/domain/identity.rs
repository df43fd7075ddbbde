//! Resolved identity types.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Which context layer supplied the active profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "layer", content = "path", rename_all = "snake_case")]
pub enum Layer {
    /// The session environment variable.
    Session,
    /// A directory link; holds the linked directory.
    Directory(PathBuf),
    /// The global active pointer.
    Global,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Session => write!(f, "session"),
            Layer::Directory(path) => write!(f, "directory ({})", path.display()),
            Layer::Global => write!(f, "global"),
        }
    }
}

/// The profile a lookup resolved to, and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    /// Qualified slug.
    pub slug: String,
    pub layer: Layer,
}

impl Resolved {
    pub fn new(slug: impl Into<String>, layer: Layer) -> Self {
        Self {
            slug: slug.into(),
            layer,
        }
    }
}
