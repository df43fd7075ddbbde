//! Tests for `keyswitch init`.

use crate::support::*;

#[test]
fn test_init_creates_root_and_master_key() {
    let t = Test::new();
    let output = t.init_cmd();
    assert_success(&output);
    assert_stdout_contains(&output, "initialized");

    assert!(t.root().join("master.key").is_file());
    assert!(t.root().join("personal").join("vault.toml").is_file());
    assert!(t.root().join("audit").is_dir());
}

#[cfg(unix)]
#[test]
fn test_init_uses_owner_only_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let t = Test::init();
    let mode = |p: std::path::PathBuf| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode(t.root()), 0o700);
    assert_eq!(mode(t.root().join("master.key")), 0o600);
    assert_eq!(mode(t.root().join("personal")), 0o700);
    assert_eq!(mode(t.root().join("personal").join("vault.toml")), 0o600);
}

#[test]
fn test_init_twice_fails() {
    let t = Test::init();
    let output = t.init_cmd();
    assert_failure(&output);
    assert_stderr_contains(&output, "already initialized");
}

#[test]
fn test_init_with_master_key_env_writes_no_key_file() {
    let t = Test::new();
    let output = t
        .cmd()
        .env("KEYSWITCH_MASTER_KEY", "correct horse battery staple")
        .arg("init")
        .output()
        .unwrap();
    assert_success(&output);
    assert!(!t.root().join("master.key").exists());

    // Without the variable the vault cannot be opened.
    let output = t.exec(&["list"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "master key not found");

    let output = t
        .cmd()
        .env("KEYSWITCH_MASTER_KEY", "correct horse battery staple")
        .arg("list")
        .output()
        .unwrap();
    assert_success(&output);
}

#[test]
fn test_commands_before_init_hint_at_init() {
    let t = Test::new();
    let output = t.exec(&["list"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "not initialized");
    assert_stderr_contains(&output, "keyswitch init");
}

#[test]
fn test_help_lists_commands() {
    use predicates::prelude::*;

    let t = Test::new();
    t.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("switch"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("team"));
}
