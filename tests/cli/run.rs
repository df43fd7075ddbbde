//! Tests for `keyswitch run`.

use crate::support::*;

#[cfg(unix)]
#[test]
fn test_run_injects_active_api_key() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    assert_success(&t.switch("work"));

    let output = t.run(&["sh", "-c", "printf '%s' \"$CODEX_API_KEY\""]);
    assert_success(&output);
    assert_eq!(stdout(&output), WORK_KEY);
}

#[cfg(unix)]
#[test]
fn test_run_passes_exit_code_through() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    assert_success(&t.switch("work"));

    let output = t.run(&["sh", "-c", "exit 42"]);
    assert_exit_code(&output, 42);
}

#[cfg(unix)]
#[test]
fn test_run_env_override_and_extra_vars() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    assert_success(&t.exec(&["env", "set", "work", "REGION", "eu"]));
    assert_success(&t.switch("work"));

    let output = t.run(&["sh", "-c", "printf '%s' \"$REGION\""]);
    assert_eq!(stdout(&output), "eu");

    let output = t.exec(&["run", "--env", "REGION=us", "--", "sh", "-c", "printf '%s' \"$REGION\""]);
    assert_success(&output);
    assert_eq!(stdout(&output), "us");
}

#[cfg(unix)]
#[test]
fn test_run_uses_directory_profile() {
    let t = Test::with_profiles(&[("work", WORK_KEY), ("home", HOME_KEY)]);
    assert_success(&t.switch("home"));
    let project = t.subdir("project");
    assert_success(&t.exec_in(&project, &["context", "set", "work"]));

    let output = t.exec_in(&project, &["run", "--", "sh", "-c", "printf '%s' \"$CODEX_API_KEY\""]);
    assert_eq!(stdout(&output), WORK_KEY);
}

#[cfg(unix)]
#[test]
fn test_run_does_not_leak_master_key() {
    let t = Test::new();
    let init = t
        .cmd()
        .env("KEYSWITCH_MASTER_KEY", "env-master")
        .arg("init")
        .output()
        .unwrap();
    assert_success(&init);

    let with_master = |args: &[&str]| {
        t.cmd()
            .env("KEYSWITCH_MASTER_KEY", "env-master")
            .args(args)
            .output()
            .unwrap()
    };
    assert_success(&with_master(&["add", "work", "--api-key", WORK_KEY]));
    assert_success(&with_master(&["switch", "work"]));

    let output = with_master(&["run", "--", "sh", "-c", "printf '%s' \"${KEYSWITCH_MASTER_KEY:-unset}\""]);
    assert_success(&output);
    assert_eq!(stdout(&output), "unset");
}

#[test]
fn test_run_without_active_profile_fails() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    let marker = t.dir.path().join("ran");

    let output = t.run(&["touch", marker.to_str().unwrap()]);
    assert_exit_code(&output, 1);
    assert_stderr_contains(&output, "no active identity");
    assert!(!marker.exists());
}

#[test]
fn test_run_missing_program() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    assert_success(&t.switch("work"));

    let output = t.run(&["definitely-not-a-real-program-ks"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "command not found");
}

#[test]
fn test_run_requires_a_command() {
    let t = Test::init();
    let output = t.exec(&["run"]);
    assert_failure(&output);
}
