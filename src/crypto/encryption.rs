//! AES-256-GCM authenticated encryption keyed by caller passwords.
//!
//! Each call to `seal` generates a fresh random 32-byte salt, derives the
//! encryption key from the password with Argon2id, encrypts under a
//! random 12-byte nonce and returns everything as one base64 string.
//! `open` splits the pieces back out before decrypting.
//!
//! Layout of the encoded byte buffer:
//!   [ 32-byte salt | 12-byte nonce | ciphertext + 16-byte auth tag ]

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;

use crate::crypto::kdf::{derive_key, KdfParams, KeyStrategy};
use crate::errors::{LockboxError, Result};

/// Size of the key-derivation salt in bytes.
const SALT_LEN: usize = 32;

/// Size of the AES-256-GCM nonce in bytes.
const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under a key derived from `password`.
///
/// Returns a base64 string of salt || nonce || ciphertext, so the caller
/// only needs to store one blob.
pub fn seal(
    plaintext: &str,
    password: &str,
    strategy: KeyStrategy,
    params: &KdfParams,
) -> Result<String> {
    // Fresh salt per encryption, so equal plaintexts never share a key.
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);

    let key = derive_key(password, strategy, &salt, params)?;

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| LockboxError::Crypto(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| LockboxError::Crypto(format!("encryption error: {e}")))?;

    let mut output = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&salt);
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(output))
}

/// Decrypt a blob that was produced by `seal`.
///
/// Every failure mode (bad base64, truncated data, wrong password,
/// tampered ciphertext) collapses into `AuthFailure` so callers cannot
/// distinguish a wrong password from corrupt data.
pub fn open(
    encoded: &str,
    password: &str,
    strategy: KeyStrategy,
    params: &KdfParams,
) -> Result<String> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|_| LockboxError::AuthFailure)?;

    if raw.len() < SALT_LEN + NONCE_LEN {
        return Err(LockboxError::AuthFailure);
    }

    let (salt, rest) = raw.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let key = derive_key(password, strategy, salt, params)?;

    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| LockboxError::AuthFailure)?;

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| LockboxError::AuthFailure)?;

    String::from_utf8(plaintext).map_err(|_| LockboxError::AuthFailure)
}
