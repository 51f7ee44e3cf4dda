//! The encrypted entry store for one manager.
//!
//! A `Manager` owns a single table of normalized id → ciphertext and the
//! manager-scoped configuration: the password pre-hash flag and the
//! optional recovery key.  All operations re-derive the encryption key
//! from the caller's password; the store itself never holds a password.
//!
//! While recovery is enabled, every write also stores a shadow copy of
//! the value under `<id>.recovery`, encrypted with the manager's recovery
//! key.  Shadows let an out-of-band holder of the recovery key decrypt a
//! value whose primary password was lost, as a prerequisite to an
//! `overwrite` with a freshly chosen password.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::warn;
use zeroize::Zeroize;

use crate::crypto::kdf::{KdfParams, KeyStrategy};
use crate::crypto::{encryption, payload};
use crate::errors::{LockboxError, Result};
use crate::store::id::{is_recovery_id, normalize_id, recovery_id};

/// The manager's recovery key, XOR-masked so the plaintext key does not
/// sit in memory between uses.  Pad and masked bytes are zeroized on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
struct ObfuscatedKey {
    pad: Vec<u8>,
    masked: Vec<u8>,
}

impl ObfuscatedKey {
    fn conceal(key: &str) -> Self {
        let bytes = key.as_bytes();
        let mut pad = vec![0u8; bytes.len()];
        rand::rng().fill_bytes(&mut pad);

        let masked = bytes
            .iter()
            .zip(pad.iter())
            .map(|(b, p)| b ^ p)
            .collect();

        Self { pad, masked }
    }

    fn reveal(&self) -> String {
        let bytes: Vec<u8> = self
            .masked
            .iter()
            .zip(self.pad.iter())
            .map(|(b, p)| b ^ p)
            .collect();

        // The key was valid UTF-8 when concealed.
        String::from_utf8(bytes).unwrap_or_default()
    }
}

/// A named, independently keyed namespace of encrypted entries.
pub struct Manager {
    /// Normalized id → base64 ciphertext.
    entries: RwLock<HashMap<String, String>>,

    /// Serializes compound mutations (read-check-write sequences), so
    /// concurrent writers cannot interleave between their check and
    /// their insert.  Plain reads only take the `entries` lock.
    write_gate: Mutex<()>,

    /// When set, caller passwords are pre-hashed before key derivation.
    hash_passwords: AtomicBool,

    /// Recovery key, present while recovery is enabled.
    recovery: Mutex<Option<ObfuscatedKey>>,

    /// Argon2id parameters used for every key derivation.
    params: KdfParams,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(KdfParams::default())
    }
}

impl Manager {
    /// Create an empty manager with the given KDF parameters.
    pub fn new(params: KdfParams) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            write_gate: Mutex::new(()),
            hash_passwords: AtomicBool::new(false),
            recovery: Mutex::new(None),
            params,
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Whether caller passwords are pre-hashed before key derivation.
    pub fn hash_passwords(&self) -> bool {
        self.hash_passwords.load(Ordering::SeqCst)
    }

    /// Set the pre-hash flag.
    pub fn set_hash_passwords(&self, enabled: bool) {
        self.hash_passwords.store(enabled, Ordering::SeqCst);
    }

    /// Flip the pre-hash flag and return the new state.
    pub fn toggle_hash_passwords(&self) -> bool {
        !self.hash_passwords.fetch_xor(true, Ordering::SeqCst)
    }

    /// Enable recovery: install the recovery key and start writing a
    /// `<id>.recovery` shadow on every subsequent write.
    pub fn enable_recovery(&self, key: &str) {
        let mut slot = self.recovery.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(ObfuscatedKey::conceal(key));
    }

    /// Disable recovery.  Existing shadows are not purged; they remain
    /// stored until their entry is deleted.
    pub fn disable_recovery(&self) {
        let mut slot = self.recovery.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    /// Whether recovery is currently enabled.
    pub fn recovery_enabled(&self) -> bool {
        self.recovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn current_recovery_key(&self) -> Option<String> {
        self.recovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(ObfuscatedKey::reveal)
    }

    /// The key-derivation strategy for a given normalized id.  Recovery
    /// shadows are always keyed raw: their key is the machine-generated
    /// recovery key, never an end-user password.
    fn strategy_for(&self, id: &str) -> KeyStrategy {
        if is_recovery_id(id) {
            KeyStrategy::Raw
        } else {
            KeyStrategy::from_flag(self.hash_passwords())
        }
    }

    // ------------------------------------------------------------------
    // Entry operations
    // ------------------------------------------------------------------

    /// Create or replace an entry.  The previous ciphertext, if any, is
    /// discarded.  While recovery is enabled the shadow is refreshed in
    /// the same write-lock window, so readers never observe the entry
    /// and its shadow out of step.
    pub fn overwrite(&self, id: &str, value: &str, password: &str) -> Result<()> {
        let id = normalize_id(id);

        let _gate = self
            .write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.store_entry(&id, value, password)
    }

    /// Insert an entry plus its recovery shadow.  Callers must hold the
    /// write gate.
    fn store_entry(&self, id: &str, value: &str, password: &str) -> Result<()> {
        let packed = payload::pack(id, value)?;
        let ciphertext = encryption::seal(&packed, password, self.strategy_for(id), &self.params)?;

        // Encrypt the shadow before touching the table, so both rows go
        // in under one write lock.
        let mut shadow: Option<(String, String)> = None;
        if !is_recovery_id(id) {
            if let Some(recovery_key) = self.current_recovery_key() {
                let rid = recovery_id(id);
                match payload::pack(&rid, value)
                    .and_then(|p| encryption::seal(&p, &recovery_key, KeyStrategy::Raw, &self.params))
                {
                    Ok(ct) => shadow = Some((rid, ct)),
                    Err(e) => warn!(id = %rid, error = %e, "cannot write recovery shadow"),
                }
            }
        }

        let mut map = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.insert(id.to_string(), ciphertext);
        if let Some((rid, ct)) = shadow {
            map.insert(rid, ct);
        }

        Ok(())
    }

    /// Decrypt and return the value of an entry.
    ///
    /// Fails with `NotFound` when the id is absent and with `AuthFailure`
    /// when decryption fails; wrong password and corrupt ciphertext are
    /// deliberately indistinguishable.
    pub fn get(&self, id: &str, password: &str) -> Result<String> {
        let id = normalize_id(id);
        let ciphertext = self.raw_ciphertext(&id)?;

        let packed = encryption::open(&ciphertext, password, self.strategy_for(&id), &self.params)?;
        let (stored_id, value) = payload::unpack(&packed).map_err(|_| LockboxError::AuthFailure)?;

        // A payload carrying a different id was copied between keys.
        if stored_id != id {
            return Err(LockboxError::AuthFailure);
        }

        Ok(value)
    }

    /// Compare an entry's value against `expected`.
    ///
    /// Returns `Ok(false)` on a value mismatch; an absent id or a failed
    /// decryption is still an error.  The comparison runs in constant
    /// time over SHA-256 digests.
    pub fn check(&self, id: &str, password: &str, expected: &str) -> Result<bool> {
        let value = self.get(id, password)?;

        let a: [u8; 32] = Sha256::digest(value.as_bytes()).into();
        let b: [u8; 32] = Sha256::digest(expected.as_bytes()).into();
        Ok(a.ct_eq(&b).into())
    }

    /// Conditionally update an entry.
    ///
    /// A nonexistent id is created (`old_value` is ignored).  For an
    /// existing id the stored value must equal `old_value`, otherwise
    /// the operation fails with `PreconditionFailed` and the entry is
    /// left unchanged.
    pub fn set(&self, id: &str, old_value: &str, new_value: &str, password: &str) -> Result<()> {
        let id = normalize_id(id);

        let _gate = self
            .write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.contains(&id) {
            let matches = self.check(&id, password, old_value)?;
            if !matches {
                return Err(LockboxError::PreconditionFailed(id));
            }
        }

        self.store_entry(&id, new_value, password)
    }

    /// Delete an entry, but only when `value` and `password` both match
    /// the stored secret.  On any mismatch nothing is deleted.
    pub fn unset(&self, id: &str, value: &str, password: &str) -> Result<()> {
        let id = normalize_id(id);

        let _gate = self
            .write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let matches = self.check(&id, password, value)?;
        if !matches {
            return Err(LockboxError::ValueMismatch);
        }

        self.remove_with_shadow(&id)
    }

    /// Existence test with no decryption.
    pub fn exists(&self, id: &str) -> bool {
        self.contains(&normalize_id(id))
    }

    /// All stored ids, sorted, recovery shadows included.
    pub fn list(&self) -> Vec<String> {
        let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = map.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All stored ids joined by `delimiter`.
    ///
    /// Rejects a delimiter that is empty or occurs inside any id, since
    /// the joined output could not be split back apart unambiguously.
    pub fn list_joined(&self, delimiter: &str) -> Result<String> {
        if delimiter.is_empty() {
            return Err(LockboxError::InvalidArgument(
                "list delimiter must not be empty".into(),
            ));
        }

        let ids = self.list();
        for id in &ids {
            if id.contains(delimiter) {
                return Err(LockboxError::InvalidArgument(format!(
                    "list delimiter {delimiter:?} collides with id {id:?}"
                )));
            }
        }

        Ok(ids.join(delimiter))
    }

    /// Remove an entry unconditionally, along with its recovery shadow.
    pub fn delete(&self, id: &str) -> Result<()> {
        let id = normalize_id(id);

        let _gate = self
            .write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.remove_with_shadow(&id)
    }

    /// Remove every entry.  Idempotent.
    pub fn clear(&self) {
        let _gate = self
            .write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of stored entries, shadows included.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Change the password of an entry from `old_password` to
    /// `new_password`, re-encrypting the stored payload unchanged.
    ///
    /// The recovery shadow is independent of the primary password and is
    /// left as is.
    pub fn rewrite_key(&self, id: &str, old_password: &str, new_password: &str) -> Result<()> {
        let id = normalize_id(id);

        let _gate = self
            .write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let ciphertext = self.raw_ciphertext(&id)?;
        let strategy = self.strategy_for(&id);

        let mut packed = encryption::open(&ciphertext, old_password, strategy, &self.params)?;
        let (stored_id, _) = payload::unpack(&packed).map_err(|_| LockboxError::AuthFailure)?;
        if stored_id != id {
            packed.zeroize();
            return Err(LockboxError::AuthFailure);
        }

        let renewed = encryption::seal(&packed, new_password, strategy, &self.params);
        packed.zeroize();

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, renewed?);

        Ok(())
    }

    // ------------------------------------------------------------------
    // Snapshot support
    // ------------------------------------------------------------------

    /// Clone the ciphertext table, for snapshot serialization.
    pub(crate) fn export_entries(&self) -> HashMap<String, String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the ciphertext table, for snapshot deserialization.
    pub(crate) fn replace_entries(&self, entries: HashMap<String, String>) {
        let _gate = self
            .write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        *self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner) = entries;
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn contains(&self, normalized: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(normalized)
    }

    fn raw_ciphertext(&self, normalized: &str) -> Result<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(normalized)
            .cloned()
            .ok_or_else(|| LockboxError::NotFound(normalized.to_string()))
    }

    fn remove_with_shadow(&self, normalized: &str) -> Result<()> {
        let mut map = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if map.remove(normalized).is_none() {
            return Err(LockboxError::NotFound(normalized.to_string()));
        }

        if !is_recovery_id(normalized) {
            map.remove(&recovery_id(normalized));
        }

        Ok(())
    }
}
