//! Integration tests for the crypto layer.

use lockbox::crypto::kdf::KdfParams;
use lockbox::crypto::{encryption, payload, KeyStrategy};
use lockbox::LockboxError;

/// Cheap Argon2 parameters so the suite stays fast.  The minimum floors
/// enforced by the KDF still apply.
fn params() -> KdfParams {
    KdfParams {
        memory_kib: 8_192,
        iterations: 1,
        parallelism: 1,
    }
}

// ---------------------------------------------------------------------------
// Seal and open round-trip
// ---------------------------------------------------------------------------

#[test]
fn seal_open_roundtrip() {
    let sealed = encryption::seal("hello world", "pw-1", KeyStrategy::Raw, &params()).unwrap();
    let opened = encryption::open(&sealed, "pw-1", KeyStrategy::Raw, &params()).unwrap();
    assert_eq!(opened, "hello world");
}

#[test]
fn seal_is_randomized() {
    // Fresh salt and nonce per call: equal inputs never produce equal
    // ciphertexts.
    let a = encryption::seal("same", "pw", KeyStrategy::Raw, &params()).unwrap();
    let b = encryption::seal("same", "pw", KeyStrategy::Raw, &params()).unwrap();
    assert_ne!(a, b);
}

#[test]
fn wrong_password_fails_to_open() {
    let sealed = encryption::seal("secret", "correct", KeyStrategy::Raw, &params()).unwrap();
    let result = encryption::open(&sealed, "wrong", KeyStrategy::Raw, &params());
    assert!(matches!(result, Err(LockboxError::AuthFailure)));
}

#[test]
fn tampered_ciphertext_fails_to_open() {
    let sealed = encryption::seal("secret", "pw", KeyStrategy::Raw, &params()).unwrap();

    // Flip one character somewhere past the salt region.
    let mut chars: Vec<char> = sealed.chars().collect();
    let mid = chars.len() / 2;
    chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();

    let result = encryption::open(&tampered, "pw", KeyStrategy::Raw, &params());
    assert!(matches!(result, Err(LockboxError::AuthFailure)));
}

#[test]
fn truncated_ciphertext_fails_to_open() {
    let result = encryption::open("c2hvcnQ=", "pw", KeyStrategy::Raw, &params());
    assert!(matches!(result, Err(LockboxError::AuthFailure)));
}

#[test]
fn garbage_base64_fails_to_open() {
    let result = encryption::open("not base64 at all!", "pw", KeyStrategy::Raw, &params());
    assert!(matches!(result, Err(LockboxError::AuthFailure)));
}

// ---------------------------------------------------------------------------
// Key strategy
// ---------------------------------------------------------------------------

#[test]
fn strategy_mismatch_fails_to_open() {
    // A blob sealed with the pre-hashed strategy derives a different key
    // than the raw strategy, even for the same password.
    let sealed = encryption::seal("secret", "pw", KeyStrategy::Hashed, &params()).unwrap();

    let raw = encryption::open(&sealed, "pw", KeyStrategy::Raw, &params());
    assert!(matches!(raw, Err(LockboxError::AuthFailure)));

    let hashed = encryption::open(&sealed, "pw", KeyStrategy::Hashed, &params()).unwrap();
    assert_eq!(hashed, "secret");
}

// ---------------------------------------------------------------------------
// KDF parameter floors
// ---------------------------------------------------------------------------

#[test]
fn weak_kdf_params_rejected() {
    let weak = KdfParams {
        memory_kib: 1_024,
        iterations: 1,
        parallelism: 1,
    };
    let result = encryption::seal("x", "pw", KeyStrategy::Raw, &weak);
    assert!(matches!(result, Err(LockboxError::KeyDerivationFailed(_))));
}

// ---------------------------------------------------------------------------
// Packed payload
// ---------------------------------------------------------------------------

#[test]
fn payload_roundtrip() {
    let packed = payload::pack("services/db", "hunter2").unwrap();
    let (id, value) = payload::unpack(&packed).unwrap();
    assert_eq!(id, "services/db");
    assert_eq!(value, "hunter2");
}

#[test]
fn payload_rejects_unknown_fields() {
    let input = r#"{"id":"a","value":"b","padding":" ","entropy":"","timestamp":"","extra":1}"#;
    assert!(payload::unpack(input).is_err());
}

#[test]
fn payload_rejects_missing_fields() {
    let input = r#"{"id":"a","value":"b"}"#;
    assert!(payload::unpack(input).is_err());
}
