//! On-disk storage primitives.
//!
//! Atomic writes, owner-only permissions and the advisory vault lock. The
//! vault layer builds on these; nothing here knows about profiles.

mod fs;
mod lock;

pub use fs::{
    ensure_private_dir, read_optional, remove_if_exists, restrict, secure_tree, verify_mode,
    write_atomic, DIR_MODE, FILE_MODE,
};
pub use lock::VaultLock;
