//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use std::path::Path;
use std::process::Output;

impl Test {
    /// Create a keyswitch command with an isolated environment.
    ///
    /// Returns a Command configured with:
    /// - KEYSWITCH_HOME pointing into the temporary home directory
    /// - HOME set to the temporary home directory
    /// - no inherited session profile or master key
    /// - no git identity or global git configuration
    /// - current directory set to the test project directory
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("keyswitch").expect("failed to find keyswitch binary");
        cmd.env("KEYSWITCH_HOME", self.root());
        cmd.env("HOME", self.home.path());
        cmd.env("USERPROFILE", self.home.path());
        cmd.env("NO_COLOR", "1");
        for var in [
            "KEYSWITCH_PROFILE",
            "KEYSWITCH_MASTER_KEY",
            "KEYSWITCH_API_KEY",
            "KEYSWITCH_TEAM_KEY",
            "KEYSWITCH_ENV_VALUE",
            "KEYSWITCH_LOG",
            "GIT_AUTHOR_NAME",
            "GIT_AUTHOR_EMAIL",
            "GIT_COMMITTER_NAME",
            "GIT_COMMITTER_EMAIL",
            "EMAIL",
            "XDG_CONFIG_HOME",
        ] {
            cmd.env_remove(var);
        }
        cmd.env("GIT_CONFIG_GLOBAL", self.home.path().join(".gitconfig"));
        cmd.env("GIT_CONFIG_NOSYSTEM", "1");
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// Run keyswitch with `args`.
    pub fn exec(&self, args: &[&str]) -> Output {
        self.cmd()
            .args(args)
            .output()
            .expect("failed to run keyswitch")
    }

    /// Run keyswitch with `args` from `dir`.
    pub fn exec_in(&self, dir: &Path, args: &[&str]) -> Output {
        self.cmd()
            .current_dir(dir)
            .args(args)
            .output()
            .expect("failed to run keyswitch")
    }

    /// Shortcut for `keyswitch init`.
    pub fn init_cmd(&self) -> Output {
        self.exec(&["init"])
    }

    /// Shortcut for `keyswitch add <name> --api-key <key>`.
    pub fn add(&self, name: &str, key: &str) -> Output {
        self.exec(&["add", name, "--api-key", key])
    }

    /// Shortcut for `keyswitch get`.
    pub fn get(&self, slug: &str) -> Output {
        self.exec(&["get", slug])
    }

    /// Shortcut for `keyswitch list --json`.
    pub fn list_json(&self) -> serde_json::Value {
        let output = self.exec(&["list", "--json"]);
        super::assert_success(&output);
        serde_json::from_slice(&output.stdout).expect("list --json is valid JSON")
    }

    /// Shortcut for `keyswitch switch`.
    pub fn switch(&self, slug: &str) -> Output {
        self.exec(&["switch", slug])
    }

    /// Shortcut for `keyswitch resolve`.
    pub fn resolve_in(&self, dir: &Path) -> Output {
        self.exec_in(dir, &["resolve"])
    }

    /// Shortcut for `keyswitch run -- <args>`.
    pub fn run(&self, args: &[&str]) -> Output {
        let mut full = vec!["run", "--"];
        full.extend_from_slice(args);
        self.exec(&full)
    }

    /// Shortcut for `keyswitch audit --json`.
    pub fn audit_json(&self, extra: &[&str]) -> serde_json::Value {
        let mut args = vec!["audit", "--json"];
        args.extend_from_slice(extra);
        let output = self.exec(&args);
        super::assert_success(&output);
        serde_json::from_slice(&output.stdout).expect("audit --json is valid JSON")
    }
}
