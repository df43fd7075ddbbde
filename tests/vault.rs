//! Vault API tests.
//!
//! Exercise the vault store through its public interface: persistence,
//! crash leftovers, locking and concurrent writers.

use std::time::Duration;

use keyswitch::core::crypto::{KdfParams, SecretMaterial};
use keyswitch::core::domain::{Credential, Profile};
use keyswitch::core::validation::{slugify, validate_slug};
use keyswitch::core::vault::Vault;
use keyswitch::error::{Error, VaultError};
use proptest::prelude::*;
use tempfile::TempDir;

fn params() -> KdfParams {
    KdfParams {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    }
}

fn secret() -> SecretMaterial {
    SecretMaterial::new("vault-test-master").unwrap()
}

fn setup() -> (TempDir, Vault) {
    let tmp = TempDir::new().unwrap();
    let vault = Vault::init(&tmp.path().join("personal"), "personal", &secret(), &params()).unwrap();
    (tmp, vault)
}

fn api_profile(name: &str, key: &str) -> Profile {
    Profile::new(name, Credential::api_key(key)).unwrap()
}

#[test]
fn test_profiles_persist_across_reopen() {
    let (_tmp, mut vault) = setup();
    vault.put(api_profile("work", "sk-work"), false).unwrap();
    vault.put(api_profile("home", "sk-home"), false).unwrap();
    vault.delete("home").unwrap();

    let reopened = Vault::open(vault.dir(), "personal", &secret()).unwrap();
    assert_eq!(reopened.len(), 1);
    let profile = reopened.get("work").unwrap();
    assert_eq!(profile.credential, Credential::api_key("sk-work"));
}

#[test]
fn test_replacing_a_profile_leaves_one_record() {
    let (_tmp, mut vault) = setup();
    vault.put(api_profile("work", "sk-1"), false).unwrap();
    vault.put(api_profile("work", "sk-2"), true).unwrap();

    let records = std::fs::read_dir(vault.dir().join("profiles")).unwrap().count();
    assert_eq!(records, 1);
    assert_eq!(vault.get("work").unwrap().credential, Credential::api_key("sk-2"));
}

#[test]
fn test_leftover_records_do_not_shadow_the_index() {
    let (_tmp, mut vault) = setup();
    vault.put(api_profile("work", "sk-committed"), false).unwrap();

    // A record written by a writer that died before swapping the index.
    let orphan = vault.dir().join("profiles").join("work.deadbeefdeadbeef.enc");
    std::fs::write(&orphan, b"garbage").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&orphan, std::fs::Permissions::from_mode(0o600)).unwrap();
    }

    let reopened = Vault::open(vault.dir(), "personal", &secret()).unwrap();
    assert_eq!(
        reopened.get("work").unwrap().credential,
        Credential::api_key("sk-committed")
    );
}

#[test]
fn test_writer_waits_for_lock_then_times_out() {
    let (_tmp, vault) = setup();
    let _held = vault.lock().unwrap();

    let mut other = Vault::open(vault.dir(), "personal", &secret())
        .unwrap()
        .with_lock_timeout(Duration::from_millis(50));
    let err = other.put(api_profile("work", "sk"), false).unwrap_err();
    assert!(matches!(err, Error::Vault(VaultError::Locked { .. })));
    assert!(other.is_empty());
}

#[test]
fn test_concurrent_writers_lose_nothing() {
    let (_tmp, vault) = setup();
    let dir = vault.dir().to_path_buf();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let dir = dir.clone();
            std::thread::spawn(move || {
                let mut vault = Vault::open(&dir, "personal", &secret())
                    .unwrap()
                    .with_lock_timeout(Duration::from_secs(30));
                for j in 0..3 {
                    let name = format!("writer-{}-{}", i, j);
                    vault.put(api_profile(&name, "sk"), false).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let reopened = Vault::open(&dir, "personal", &secret()).unwrap();
    assert_eq!(reopened.len(), 12);
}

proptest! {
    #[test]
    fn test_slugify_output_is_always_valid(name in "\\PC{0,40}") {
        let slug = slugify(&name);
        if !slug.is_empty() {
            prop_assert!(validate_slug(&slug).is_ok(), "slug {:?} from {:?}", slug, name);
        }
    }
}
