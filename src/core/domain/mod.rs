//! Domain types.

pub mod audit;
pub mod identity;
pub mod profile;
mod sync;
mod vault_info;

pub use audit::{Action, AuditEntry, AuditFilter};
pub use identity::{Layer, Resolved};
pub use profile::{
    mask, Credential, CredentialKind, Profile, ProfileMeta, ProfileView, QualifiedSlug,
};
pub use sync::{Conflict, MergeReport, PushReport};
pub use vault_info::VaultInfo;
