//! Tests for `keyswitch export/import`.

use crate::support::*;

fn with_master(t: &Test, args: &[&str]) -> std::process::Output {
    t.cmd()
        .env("KEYSWITCH_MASTER_KEY", "shared-master")
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_export_then_import_elsewhere() {
    let source = Test::new();
    assert_success(&with_master(&source, &["init"]));
    assert_success(&with_master(&source, &["add", "work", "--api-key", WORK_KEY]));
    assert_success(&with_master(&source, &["add", "home", "--api-key", HOME_KEY]));

    let bundle = source.dir.path().join("profiles.bundle");
    let output = with_master(&source, &["export", bundle.to_str().unwrap()]);
    assert_success(&output);
    assert!(!std::fs::read_to_string(&bundle).unwrap().contains(WORK_KEY));

    let target = Test::new();
    assert_success(&with_master(&target, &["init"]));
    assert_success(&with_master(&target, &["add", "work", "--api-key", "sk-local"]));

    let output = with_master(&target, &["import", bundle.to_str().unwrap()]);
    assert_success(&output);
    assert_stderr_contains(&output, "skipped existing: work");

    let output = with_master(&target, &["get", "work", "--unmask"]);
    assert_stdout_contains(&output, "sk-local");

    assert_success(&with_master(&target, &["import", bundle.to_str().unwrap(), "--force"]));
    let output = with_master(&target, &["get", "work", "--unmask"]);
    assert_stdout_contains(&output, WORK_KEY);
}

#[test]
fn test_import_with_wrong_master_key_fails() {
    let source = Test::new();
    assert_success(&with_master(&source, &["init"]));
    assert_success(&with_master(&source, &["add", "work", "--api-key", WORK_KEY]));
    let bundle = source.dir.path().join("profiles.bundle");
    assert_success(&with_master(&source, &["export", bundle.to_str().unwrap()]));

    let target = Test::init();
    let output = target.exec(&["import", bundle.to_str().unwrap()]);
    assert_failure(&output);
    assert_eq!(target.list_json()["count"], 0);
}
