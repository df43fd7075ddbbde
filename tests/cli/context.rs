//! Tests for `keyswitch switch/status/resolve/context`.

use crate::support::*;

#[test]
fn test_resolve_with_nothing_active() {
    let t = Test::init();
    let output = t.exec(&["resolve"]);
    assert_exit_code(&output, 1);
    assert_eq!(stdout(&output), "");
}

#[test]
fn test_switch_sets_global_profile() {
    let t = Test::with_profiles(&[("work", WORK_KEY), ("home", HOME_KEY)]);
    assert_success(&t.switch("home"));

    let output = t.exec(&["resolve"]);
    assert_success(&output);
    assert_eq!(stdout(&output).trim(), "home");

    let output = t.exec(&["status", "--json"]);
    assert_success(&output);
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["active"]["slug"], "home");
    assert_eq!(status["active"]["layer"]["layer"], "global");
}

#[test]
fn test_switch_to_missing_profile_fails() {
    let t = Test::init();
    let output = t.switch("ghost");
    assert_failure(&output);
    assert_stderr_contains(&output, "profile not found");

    let output = t.switch("acme/ghost");
    assert_failure(&output);
    assert_stderr_contains(&output, "unknown namespace");
}

#[test]
fn test_directory_link_applies_to_subdirectories() {
    let t = Test::with_profiles(&[("work", WORK_KEY), ("home", HOME_KEY)]);
    assert_success(&t.switch("home"));

    let project = t.subdir("client");
    let nested = t.subdir("client/src/deep");
    assert_success(&t.exec_in(&project, &["context", "set", "work"]));

    assert_eq!(stdout(&t.resolve_in(&nested)).trim(), "work");
    assert_eq!(stdout(&t.resolve_in(t.dir.path())).trim(), "home");

    let output = t.exec_in(&nested, &["status"]);
    assert_success(&output);
    assert_stdout_contains(&output, "directory");

    assert_success(&t.exec_in(&project, &["context", "unset"]));
    assert_eq!(stdout(&t.resolve_in(&nested)).trim(), "home");
}

#[test]
fn test_context_set_with_dir_flag() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    let other = t.subdir("elsewhere");
    let output = t.exec(&["context", "set", "work", "--dir", other.to_str().unwrap()]);
    assert_success(&output);
    assert_eq!(stdout(&t.resolve_in(&other)).trim(), "work");

    let output = t.exec(&["context", "unset", "--dir", other.to_str().unwrap()]);
    assert_success(&output);
    assert_exit_code(&t.resolve_in(&other), 1);
}

#[test]
fn test_session_variable_overrides_everything() {
    let t = Test::with_profiles(&[("work", WORK_KEY), ("home", HOME_KEY)]);
    assert_success(&t.switch("home"));
    assert_success(&t.exec(&["context", "set", "home"]));

    let output = t
        .cmd()
        .env("KEYSWITCH_PROFILE", "work")
        .arg("resolve")
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(stdout(&output).trim(), "work");
}

#[test]
fn test_remove_clears_active_and_links() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    assert_success(&t.switch("work"));
    assert_success(&t.exec(&["context", "set", "work"]));

    assert_success(&t.exec(&["remove", "work"]));
    assert_exit_code(&t.exec(&["resolve"]), 1);
}

#[test]
fn test_status_without_active_profile_hints_switch() {
    use predicates::prelude::*;

    let t = Test::init();
    t.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("none"))
        .stderr(predicate::str::contains("keyswitch switch"));
}
