//! Tests for `keyswitch audit`.

use crate::support::*;

#[cfg(unix)]
#[test]
fn test_audit_records_each_access_once() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    assert_success(&t.get("work"));
    assert_success(&t.switch("work"));
    assert_success(&t.run(&["true"]));

    let entries = t.audit_json(&[]);
    let actions: Vec<_> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap().to_string())
        .collect();
    // Newest first.
    assert_eq!(actions, vec!["inject", "switch", "read", "modify"]);
    assert_eq!(entries[0]["exposed"], true);
    assert_eq!(entries[2]["exposed"], false);
}

#[test]
fn test_audit_filters() {
    let t = Test::with_profiles(&[("work", WORK_KEY), ("home", HOME_KEY)]);
    assert_success(&t.get("work"));
    assert_success(&t.exec(&["get", "home", "--unmask"]));

    let reads = t.audit_json(&["--action", "read"]);
    assert_eq!(reads.as_array().unwrap().len(), 2);
    assert_eq!(reads[0]["slug"], "home");
    assert_eq!(reads[0]["exposed"], true);

    let work = t.audit_json(&["--profile", "work"]);
    assert_eq!(work.as_array().unwrap().len(), 2);

    let limited = t.audit_json(&["-n", "1"]);
    assert_eq!(limited.as_array().unwrap().len(), 1);
}

#[test]
fn test_audit_never_contains_secrets() {
    let t = Test::with_profiles(&[("work", WORK_KEY)]);
    assert_success(&t.exec(&["get", "work", "--unmask"]));

    let log = std::fs::read_to_string(t.root().join("audit").join("personal.log")).unwrap();
    assert!(!log.contains(WORK_KEY));
    assert_eq!(log.lines().count(), 2);

    let output = t.exec(&["audit"]);
    assert_success(&output);
    assert_stdout_contains(&output, "read");
    assert_stdout_contains(&output, "(exposed)");
}
