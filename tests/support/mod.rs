//! Test support utilities for keyswitch integration tests.
//!
//! Provides reusable test environment setup and helper commands.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;
pub mod skip;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::path::PathBuf;

use tempfile::TempDir;

/// Test environment with isolated temp directories.
///
/// Each test gets its own project dir and home dir. The keyswitch root lives
/// inside the home dir. No process-global state is mutated; child processes
/// get `.current_dir()` and explicit environment variables, so tests can run
/// in parallel.
pub struct Test {
    /// Working directory for commands
    pub dir: TempDir,
    /// Temporary home directory
    pub home: TempDir,
}

impl Test {
    /// Create a new environment with a fast-KDF `settings.toml` and no vault.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let home = TempDir::new().expect("failed to create temp home");
        let t = Self { dir, home };

        std::fs::create_dir_all(t.root()).expect("failed to create root");
        std::fs::write(t.root().join("settings.toml"), FAST_SETTINGS)
            .expect("failed to write settings");
        t
    }

    /// Create an environment with keyswitch initialized.
    pub fn init() -> Self {
        let t = Self::new();
        let output = t.init_cmd();
        assert!(
            output.status.success(),
            "Failed to initialize: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        t
    }

    /// Create an initialized environment with API-key profiles added.
    pub fn with_profiles(profiles: &[(&str, &str)]) -> Self {
        let t = Self::init();
        for (name, key) in profiles {
            let output = t.add(name, key);
            assert!(
                output.status.success(),
                "Failed to add profile {}: {}",
                name,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        t
    }

    /// The keyswitch root.
    pub fn root(&self) -> PathBuf {
        self.home.path().join("keyswitch")
    }

    /// A subdirectory of the project dir, created if missing.
    pub fn subdir(&self, rel: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(&path).expect("failed to create subdir");
        path
    }
}
