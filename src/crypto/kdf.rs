//! Password-based key derivation using Argon2id.
//!
//! Every ciphertext carries its own random salt, and the encryption key
//! is re-derived from the caller's password on each operation.  A manager
//! can additionally pre-hash passwords before derivation; the pre-hash is
//! an unsalted SHA-256 digest so the same password always re-derives the
//! same key.

use argon2::{Algorithm, Argon2, Params, Version};
use sha2::{Digest, Sha256};

use crate::errors::{LockboxError, Result};

/// Length of the derived key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Configurable Argon2id parameters.
///
/// These map 1:1 to the fields in `Settings` so embedders can pass
/// whatever they configured in `lockbox.toml`.
#[derive(Debug, Clone, Copy)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 32 768 = 32 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 32_768,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// How a caller-supplied password is treated before key derivation.
///
/// `Hashed` replaces the password with its SHA-256 digest, so the raw
/// password never reaches the KDF.  The digest is deterministic on
/// purpose: a salted hash here would make the key underivable on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    #[default]
    Raw,
    Hashed,
}

impl KeyStrategy {
    /// Returns the strategy for a flag value, `Hashed` when `true`.
    pub fn from_flag(hashed: bool) -> Self {
        if hashed {
            Self::Hashed
        } else {
            Self::Raw
        }
    }

    /// Apply the strategy to a raw password.
    fn apply(self, password: &str) -> Vec<u8> {
        match self {
            Self::Raw => password.as_bytes().to_vec(),
            Self::Hashed => Sha256::digest(password.as_bytes()).to_vec(),
        }
    }
}

/// Derive a 32-byte encryption key from a password and salt.
///
/// The same password + salt + params always produce the same key.
/// Enforces minimum Argon2 parameters to prevent dangerously weak KDF
/// settings.
pub fn derive_key(
    password: &str,
    strategy: KeyStrategy,
    salt: &[u8],
    kdf_params: &KdfParams,
) -> Result<[u8; KEY_LEN]> {
    if kdf_params.memory_kib < MIN_MEMORY_KIB {
        return Err(LockboxError::KeyDerivationFailed(format!(
            "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
            kdf_params.memory_kib
        )));
    }
    if kdf_params.iterations < 1 {
        return Err(LockboxError::KeyDerivationFailed(
            "Argon2 iterations must be at least 1".into(),
        ));
    }
    if kdf_params.parallelism < 1 {
        return Err(LockboxError::KeyDerivationFailed(
            "Argon2 parallelism must be at least 1".into(),
        ));
    }

    let params = Params::new(
        kdf_params.memory_kib,
        kdf_params.iterations,
        kdf_params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| LockboxError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let material = strategy.apply(password);
    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(&material, salt, &mut key)
        .map_err(|e| LockboxError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}
