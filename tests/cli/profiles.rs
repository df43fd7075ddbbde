//! Tests for `keyswitch add/get/list/remove/env`.

use crate::support::*;

#[test]
fn test_add_and_list() {
    let t = Test::with_profiles(&[("Work", WORK_KEY), ("Home", HOME_KEY)]);

    let list = t.list_json();
    assert_eq!(list["count"], 2);
    let slugs: Vec<_> = list["profiles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(slugs, vec!["home", "work"]);

    let output = t.exec(&["list"]);
    assert_success(&output);
    assert_stdout_contains(&output, "work");
    assert_stdout_excludes(&output, WORK_KEY);
}

#[test]
fn test_add_duplicate_needs_force() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);

    let output = t.add("work", HOME_KEY);
    assert_failure(&output);
    assert_stderr_contains(&output, "already exists");

    let output = t.exec(&["add", "work", "--api-key", HOME_KEY, "--force"]);
    assert_success(&output);
    let output = t.exec(&["get", "work", "--unmask"]);
    assert_stdout_contains(&output, HOME_KEY);
}

#[test]
fn test_get_masks_unless_unmasked() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);

    let output = t.get("work");
    assert_success(&output);
    assert_stdout_contains(&output, "sk-w...cdef");
    assert_stdout_excludes(&output, WORK_KEY);

    let output = t.exec(&["get", "work", "--unmask", "--json"]);
    assert_success(&output);
    let view: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(view["secrets"]["api_key"], WORK_KEY);
    assert_eq!(view["masked"], false);
}

#[test]
fn test_add_api_key_from_env() {
    let t = Test::init();
    let output = t
        .cmd()
        .env("KEYSWITCH_API_KEY", WORK_KEY)
        .args(["add", "ci"])
        .output()
        .unwrap();
    assert_success(&output);

    let output = t.exec(&["get", "ci", "--unmask"]);
    assert_stdout_contains(&output, WORK_KEY);
}

#[test]
fn test_add_oauth_and_env_only_profiles() {
    let t = Test::init();
    assert_success(&t.exec(&[
        "add",
        "chat",
        "--access-token",
        "at-123",
        "--refresh-token",
        "rt-456",
        "--email",
        "me@example.com",
    ]));
    assert_success(&t.exec(&["add", "aws", "--env", "AWS_REGION=eu-west-1", "--tag", "cloud"]));

    let output = t.exec(&["get", "chat", "--unmask", "--json"]);
    let view: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(view["kind"], "oauth");
    assert_eq!(view["secrets"]["refresh_token"], "rt-456");
    assert_eq!(view["email"], "me@example.com");

    let tagged = t.exec(&["list", "--tag", "cloud", "--json"]);
    let tagged: serde_json::Value = serde_json::from_slice(&tagged.stdout).unwrap();
    assert_eq!(tagged["count"], 1);
    assert_eq!(tagged["profiles"][0]["slug"], "aws");
}

#[test]
fn test_add_rejects_empty_profile() {
    let t = Test::init();
    let output = t.exec(&["add", "nothing"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "credential is empty");
}

#[test]
fn test_remove_profile() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    assert_success(&t.exec(&["rm", "work"]));
    assert_eq!(t.list_json()["count"], 0);

    let output = t.get("work");
    assert_failure(&output);
    assert_stderr_contains(&output, "profile not found");
}

#[test]
fn test_env_set_and_unset() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    assert_success(&t.exec(&["env", "set", "work", "AWS_REGION", "us-east-1"]));

    let output = t.exec(&["get", "work", "--json"]);
    let view: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(view["env"]["AWS_REGION"], "us-east-1");

    assert_success(&t.exec(&["env", "unset", "work", "AWS_REGION"]));
    let output = t.exec(&["env", "unset", "work", "AWS_REGION"]);
    assert_success(&output);
    assert_stdout_contains(&output, "was not set");

    let output = t.exec(&["env", "set", "work", "BAD-NAME", "x"]);
    assert_failure(&output);
}

#[test]
fn test_env_set_reads_value_from_stdin_or_env() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    let output = t
        .cmd()
        .args(["env", "set", "work", "DB_PASSWORD"])
        .write_stdin("piped-secret\n")
        .output()
        .unwrap();
    assert_success(&output);

    let output = t
        .cmd()
        .env("KEYSWITCH_ENV_VALUE", "from-env")
        .args(["env", "set", "work", "DB_USER"])
        .output()
        .unwrap();
    assert_success(&output);

    let output = t.exec(&["get", "work", "--json", "--unmask"]);
    let view: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(view["env"]["DB_PASSWORD"], "piped-secret");
    assert_eq!(view["env"]["DB_USER"], "from-env");

    let output = t
        .cmd()
        .args(["env", "set", "work", "EMPTY"])
        .write_stdin("")
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "no value given for 'EMPTY'");
}

#[test]
fn test_vault_files_hold_no_plaintext() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    let mut pending = vec![t.root()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let bytes = std::fs::read(&path).unwrap();
                let text = String::from_utf8_lossy(&bytes);
                assert!(!text.contains(WORK_KEY), "plaintext key in {}", path.display());
            }
        }
    }
}
