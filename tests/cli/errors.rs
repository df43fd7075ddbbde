//! Tests for error reporting.

use crate::support::*;

#[test]
fn test_tampered_profile_is_detected() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    let profiles = t.root().join("personal").join("profiles");
    let blob = std::fs::read_dir(&profiles)
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().is_some_and(|ext| ext == "enc"))
        .unwrap();

    let mut bytes = std::fs::read(&blob).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(&blob, bytes).unwrap();

    let output = t.get("work");
    assert_failure(&output);
    assert_stderr_contains(&output, "authentication failed");
}

#[test]
fn test_wrong_master_key_is_rejected() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    let output = t
        .cmd()
        .env("KEYSWITCH_MASTER_KEY", "not-the-key")
        .arg("list")
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "wrong master key");
}

#[cfg(unix)]
#[test]
fn test_loose_permissions_refuse_to_open() {
    use std::os::unix::fs::PermissionsExt;

    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    let key = t.root().join("master.key");
    std::fs::set_permissions(&key, std::fs::Permissions::from_mode(0o644)).unwrap();

    let output = t.exec(&["list"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "insecure permissions");
    assert_stderr_contains(&output, "chmod");
}

#[test]
fn test_invalid_profile_name() {
    let t = Test::init();
    let output = t.exec(&["add", "!!!", "--api-key", WORK_KEY]);
    assert_failure(&output);
    assert_stderr_contains(&output, "invalid profile name");
}

#[test]
fn test_malformed_settings_are_reported() {
    let t = Test::new();
    std::fs::write(t.root().join("settings.toml"), "[kdf\n").unwrap();
    let output = t.init_cmd();
    assert_failure(&output);
    assert_stderr_contains(&output, "failed to parse");
}
