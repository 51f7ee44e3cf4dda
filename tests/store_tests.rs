//! Integration tests for the entry store.

use lockbox::crypto::kdf::KdfParams;
use lockbox::{LockboxError, Manager};

/// Cheap Argon2 parameters so the suite stays fast.
fn params() -> KdfParams {
    KdfParams {
        memory_kib: 8_192,
        iterations: 1,
        parallelism: 1,
    }
}

fn manager() -> Manager {
    Manager::new(params())
}

// ---------------------------------------------------------------------------
// Overwrite and get
// ---------------------------------------------------------------------------

#[test]
fn overwrite_then_get_roundtrip() {
    let m = manager();
    m.overwrite("foo", "bar", "123").unwrap();

    assert_eq!(m.get("foo", "123").unwrap(), "bar");

    let result = m.get("foo", "wrong");
    assert!(matches!(result, Err(LockboxError::AuthFailure)));
}

#[test]
fn overwrite_replaces_previous_value() {
    let m = manager();
    m.overwrite("foo", "first", "123").unwrap();
    m.overwrite("foo", "second", "456").unwrap();

    // The old ciphertext is gone: the old password no longer works.
    assert!(m.get("foo", "123").is_err());
    assert_eq!(m.get("foo", "456").unwrap(), "second");
}

#[test]
fn get_missing_entry_is_not_found() {
    let m = manager();
    let result = m.get("missing", "pw");
    assert!(matches!(result, Err(LockboxError::NotFound(_))));
}

#[test]
fn ids_are_normalized_on_every_operation() {
    let m = manager();
    m.overwrite("/Foo/Bar", "value", "pw").unwrap();

    assert_eq!(m.get("foo/bar", "pw").unwrap(), "value");
    assert_eq!(m.get("FOO\\BAR", "pw").unwrap(), "value");
    assert!(m.exists("foo/bar"));
    assert_eq!(m.list(), vec!["foo/bar".to_string()]);
}

#[test]
fn mixed_separator_ids_collide() {
    let m = manager();
    m.overwrite("forward/backward\\foo", "a", "pw").unwrap();
    m.overwrite("forward\\backward/foo", "b", "pw").unwrap();

    // Both raw spellings normalize to the same key.
    assert_eq!(m.len(), 1);
    assert_eq!(m.get("forward/backward/foo", "pw").unwrap(), "b");
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

#[test]
fn check_compares_the_stored_value() {
    let m = manager();
    m.overwrite("foo", "bar", "123").unwrap();

    assert!(m.check("foo", "123", "bar").unwrap());
    assert!(!m.check("foo", "123", "baz").unwrap());

    // Wrong password is an error, not a false.
    assert!(matches!(
        m.check("foo", "wrong", "bar"),
        Err(LockboxError::AuthFailure)
    ));

    // Absent id is an error, not a false.
    assert!(matches!(
        m.check("missing", "123", "bar"),
        Err(LockboxError::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Set
// ---------------------------------------------------------------------------

#[test]
fn set_creates_missing_entry_ignoring_old_value() {
    let m = manager();
    m.set("foo", "irrelevant", "bar", "123").unwrap();
    assert_eq!(m.get("foo", "123").unwrap(), "bar");
}

#[test]
fn set_scenario_from_create_to_stale_old_value() {
    let m = manager();

    m.overwrite("foo", "bar", "123").unwrap();
    assert_eq!(m.get("foo", "123").unwrap(), "bar");
    assert!(m.get("foo", "wrong").is_err());

    // Conditional update succeeds while the old value matches.
    m.set("foo", "bar", "baz", "123").unwrap();
    assert_eq!(m.get("foo", "123").unwrap(), "baz");

    // Replaying the same set fails: "bar" is no longer stored.
    let result = m.set("foo", "bar", "baz", "123");
    assert!(matches!(result, Err(LockboxError::PreconditionFailed(_))));
    assert_eq!(m.get("foo", "123").unwrap(), "baz");
}

#[test]
fn set_with_wrong_password_fails() {
    let m = manager();
    m.overwrite("foo", "bar", "123").unwrap();

    let result = m.set("foo", "bar", "baz", "wrong");
    assert!(matches!(result, Err(LockboxError::AuthFailure)));
    assert_eq!(m.get("foo", "123").unwrap(), "bar");
}

// ---------------------------------------------------------------------------
// Unset
// ---------------------------------------------------------------------------

#[test]
fn unset_removes_only_on_full_match() {
    let m = manager();
    m.overwrite("foo", "bar", "123").unwrap();

    // Wrong value: entry stays.
    assert!(matches!(
        m.unset("foo", "wrong", "123"),
        Err(LockboxError::ValueMismatch)
    ));
    assert_eq!(m.get("foo", "123").unwrap(), "bar");

    // Wrong password: entry stays.
    assert!(matches!(
        m.unset("foo", "bar", "wrong"),
        Err(LockboxError::AuthFailure)
    ));
    assert_eq!(m.get("foo", "123").unwrap(), "bar");

    // Full match: entry removed; a second unset reports the absence.
    m.unset("foo", "bar", "123").unwrap();
    assert!(matches!(
        m.unset("foo", "bar", "123"),
        Err(LockboxError::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Delete and clear
// ---------------------------------------------------------------------------

#[test]
fn delete_is_unconditional() {
    let m = manager();
    m.overwrite("foo", "bar", "123").unwrap();

    m.delete("foo").unwrap();
    assert!(matches!(m.delete("foo"), Err(LockboxError::NotFound(_))));
    assert!(matches!(
        m.get("foo", "123"),
        Err(LockboxError::NotFound(_))
    ));
}

#[test]
fn clear_empties_the_store_and_is_idempotent() {
    let m = manager();
    m.overwrite("a", "1", "pw").unwrap();
    m.overwrite("b", "2", "pw").unwrap();

    m.clear();
    assert!(m.is_empty());
    assert!(matches!(m.get("a", "pw"), Err(LockboxError::NotFound(_))));

    m.clear();
    assert!(m.is_empty());
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[test]
fn list_returns_sorted_normalized_ids() {
    let m = manager();
    m.overwrite("b\\baz", "1", "pw").unwrap();
    m.overwrite("c/bar", "2", "pw").unwrap();
    m.overwrite("A", "3", "pw").unwrap();

    assert_eq!(
        m.list(),
        vec!["a".to_string(), "b/baz".to_string(), "c/bar".to_string()]
    );
}

#[test]
fn list_joined_splits_back_to_the_same_set() {
    let m = manager();
    for id in ["alpha", "beta", "gamma"] {
        m.overwrite(id, "v", "pw").unwrap();
    }

    let joined = m.list_joined(",").unwrap();
    let split: Vec<&str> = joined.split(',').collect();
    assert_eq!(split, vec!["alpha", "beta", "gamma"]);
}

#[test]
fn list_joined_rejects_ambiguous_delimiters() {
    let m = manager();
    m.overwrite("services/db", "v", "pw").unwrap();

    // "/" occurs inside the stored id.
    assert!(matches!(
        m.list_joined("/"),
        Err(LockboxError::InvalidArgument(_))
    ));

    // An empty delimiter can never be split back apart.
    assert!(matches!(
        m.list_joined(""),
        Err(LockboxError::InvalidArgument(_))
    ));

    assert!(m.list_joined(",").is_ok());
}

// ---------------------------------------------------------------------------
// Password pre-hash toggle
// ---------------------------------------------------------------------------

#[test]
fn toggle_returns_the_new_state() {
    let m = manager();
    assert!(!m.hash_passwords());
    assert!(m.toggle_hash_passwords());
    assert!(m.hash_passwords());
    assert!(!m.toggle_hash_passwords());
    assert!(!m.hash_passwords());
}

#[test]
fn hashed_writes_require_the_hashed_strategy_to_read() {
    let m = manager();
    m.set_hash_passwords(true);
    m.overwrite("foo", "bar", "123").unwrap();

    // Same flag: readable.
    assert_eq!(m.get("foo", "123").unwrap(), "bar");

    // Flag flipped off: the derived key differs, the read fails.
    m.set_hash_passwords(false);
    assert!(matches!(
        m.get("foo", "123"),
        Err(LockboxError::AuthFailure)
    ));
}

// ---------------------------------------------------------------------------
// Recovery subsystem
// ---------------------------------------------------------------------------

#[test]
fn recovery_writes_a_decryptable_shadow() {
    let m = manager();
    m.enable_recovery("recovery-key");
    m.overwrite("foo", "bar", "123").unwrap();

    assert_eq!(
        m.list(),
        vec!["foo".to_string(), "foo.recovery".to_string()]
    );

    // Both ciphertexts decrypt to the same plaintext.
    assert_eq!(m.get("foo", "123").unwrap(), "bar");
    assert_eq!(m.get("foo.recovery", "recovery-key").unwrap(), "bar");
}

#[test]
fn recovery_shadow_ignores_the_hash_toggle() {
    let m = manager();
    m.enable_recovery("recovery-key");
    m.set_hash_passwords(true);
    m.overwrite("foo", "bar", "123").unwrap();

    // The shadow is keyed raw by the machine-generated recovery key,
    // whatever the pre-hash flag says.
    assert_eq!(m.get("foo.recovery", "recovery-key").unwrap(), "bar");
}

#[test]
fn shadow_writes_do_not_recurse() {
    let m = manager();
    m.enable_recovery("recovery-key");
    m.overwrite("foo.recovery", "direct", "pw").unwrap();

    assert_eq!(m.list(), vec!["foo.recovery".to_string()]);
}

#[test]
fn disabling_recovery_keeps_existing_shadows() {
    let m = manager();
    m.enable_recovery("recovery-key");
    m.overwrite("old", "1", "pw").unwrap();

    m.disable_recovery();
    m.overwrite("new", "2", "pw").unwrap();

    let ids = m.list();
    assert!(ids.contains(&"old.recovery".to_string()));
    assert!(!ids.contains(&"new.recovery".to_string()));
}

#[test]
fn delete_removes_the_shadow_too() {
    let m = manager();
    m.enable_recovery("recovery-key");
    m.overwrite("foo", "bar", "123").unwrap();

    m.delete("foo").unwrap();
    assert!(m.is_empty());
}

#[test]
fn set_refreshes_the_shadow() {
    let m = manager();
    m.enable_recovery("recovery-key");
    m.overwrite("foo", "bar", "123").unwrap();

    m.set("foo", "bar", "baz", "123").unwrap();
    assert_eq!(m.get("foo.recovery", "recovery-key").unwrap(), "baz");
}

// ---------------------------------------------------------------------------
// Key rotation
// ---------------------------------------------------------------------------

#[test]
fn rewrite_key_switches_the_unlocking_password() {
    let m = manager();
    m.overwrite("foo", "bar", "old-pw").unwrap();

    m.rewrite_key("foo", "old-pw", "new-pw").unwrap();

    assert!(m.check("foo", "new-pw", "bar").unwrap());
    assert!(matches!(
        m.check("foo", "old-pw", "bar"),
        Err(LockboxError::AuthFailure)
    ));
}

#[test]
fn rewrite_key_requires_the_old_password() {
    let m = manager();
    m.overwrite("foo", "bar", "old-pw").unwrap();

    let result = m.rewrite_key("foo", "wrong", "new-pw");
    assert!(matches!(result, Err(LockboxError::AuthFailure)));
    assert_eq!(m.get("foo", "old-pw").unwrap(), "bar");
}

#[test]
fn rewrite_key_on_missing_entry_is_not_found() {
    let m = manager();
    let result = m.rewrite_key("missing", "a", "b");
    assert!(matches!(result, Err(LockboxError::NotFound(_))));
}

#[test]
fn rewrite_key_leaves_the_recovery_shadow_alone() {
    let m = manager();
    m.enable_recovery("recovery-key");
    m.overwrite("foo", "bar", "old-pw").unwrap();

    m.rewrite_key("foo", "old-pw", "new-pw").unwrap();

    // Primary now opens under the new password only; the shadow still
    // opens under the recovery key.
    assert_eq!(m.get("foo", "new-pw").unwrap(), "bar");
    assert_eq!(m.get("foo.recovery", "recovery-key").unwrap(), "bar");
}
