//! The serializable image of a whole registry.
//!
//! A snapshot carries, per manager, the full ciphertext table including
//! recovery shadows.  No password is needed to produce or load one:
//! ciphertexts round-trip verbatim.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{LockboxError, Result};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable registry image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    /// Format version.
    pub version: u32,

    /// Name of the default manager, when one is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Manager name → (normalized id → ciphertext).
    pub managers: BTreeMap<String, BTreeMap<String, String>>,
}

impl Snapshot {
    /// Serialize to the textual form used for dump/load and disk files.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| LockboxError::SerializationError(format!("snapshot: {e}")))
    }

    /// Parse the textual form.  Unknown fields are rejected.
    pub fn from_json(input: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(input)
            .map_err(|e| LockboxError::SerializationError(format!("snapshot: {e}")))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LockboxError::SerializationError(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        Ok(snapshot)
    }

    /// Write the snapshot to `path` atomically.
    ///
    /// The bytes go to a temp file in the same directory first and are
    /// renamed over the target, so readers never see a half-written file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;

        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let tmp = match dir {
            Some(dir) => dir.join(format!(
                ".{}.tmp",
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "snapshot".to_string())
            )),
            None => Path::new(".snapshot.tmp").to_path_buf(),
        };

        fs::write(&tmp, json.as_bytes())?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read a snapshot file written by `write_to`.
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}
