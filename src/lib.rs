//! Keyswitch - encrypted credential profiles for developers.
//!
//! Several identities (API keys, OAuth tokens, extra environment variables)
//! live in local encrypted vaults. One of them is active at a time, chosen by
//! session, directory or a global default, and is injected into child
//! processes on demand. Vaults can be shared through a git remote.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── init          # Create root, master key, personal vault
//! │   ├── add           # Add a profile
//! │   ├── profiles      # get / list / remove
//! │   ├── env           # Per-profile extra variables
//! │   ├── status        # switch / status / resolve
//! │   ├── context       # Directory links
//! │   ├── run           # Run with the active profile injected
//! │   ├── audit         # Access log
//! │   ├── sync          # Git push / pull
//! │   ├── team/         # Team vaults
//! │   └── bundle        # Encrypted export / import
//! └── core/             # Core library components
//!     ├── keyswitch     # Facade over everything below
//!     ├── crypto        # Argon2id + AES-256-GCM
//!     ├── vault/        # Encrypted profile store
//!     ├── store/        # Atomic writes, permissions, locking
//!     ├── audit         # JSON-lines access log
//!     ├── context       # Session / directory / global resolution
//!     ├── runner        # Environment injection and child processes
//!     ├── sync/         # Git transport and three-way merge
//!     ├── config        # settings.toml and paths
//!     └── domain/       # Profiles, audit entries, reports
//! ```

pub mod cli;
pub mod core;
pub mod error;
