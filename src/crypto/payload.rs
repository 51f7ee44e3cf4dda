//! The packed payload that actually gets encrypted for each entry.
//!
//! Instead of encrypting the secret value alone, the store encrypts a
//! small JSON document that binds the value to its storage id, pads the
//! value length to a block multiple and mixes in random entropy.  On
//! decryption the store re-checks the id, so a ciphertext copied to a
//! different id fails to authenticate.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::errors::{LockboxError, Result};

/// Bytes of random entropy mixed into every payload.
const ENTROPY_LEN: usize = 24;

/// The padding string grows the value length to the next multiple of this.
const PADDING_BLOCK: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Payload {
    id: String,
    value: String,
    padding: String,
    entropy: String,
    timestamp: String,
}

/// Encode an id and value into the JSON payload handed to `seal`.
pub fn pack(id: &str, value: &str) -> Result<String> {
    let padding_len = PADDING_BLOCK - (value.len() % PADDING_BLOCK) + 1;

    let mut entropy = [0u8; ENTROPY_LEN];
    rand::rng().fill_bytes(&mut entropy);

    let payload = Payload {
        id: id.to_string(),
        value: value.to_string(),
        padding: " ".repeat(padding_len),
        entropy: BASE64.encode(entropy),
        timestamp: Utc::now().to_rfc3339(),
    };

    serde_json::to_string(&payload)
        .map_err(|e| LockboxError::SerializationError(format!("payload: {e}")))
}

/// Decode a payload produced by `pack`, returning `(id, value)`.
///
/// Unknown fields are rejected; a malformed payload after a successful
/// decrypt means the stored data was not written by this store.
pub fn unpack(input: &str) -> Result<(String, String)> {
    let payload: Payload = serde_json::from_str(input)
        .map_err(|e| LockboxError::SerializationError(format!("payload: {e}")))?;
    Ok((payload.id, payload.value))
}
