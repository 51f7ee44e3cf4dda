use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::KdfParams;
use crate::errors::{LockboxError, Result};

/// Project-level configuration, loaded from `lockbox.toml`.
///
/// Every field has a sensible default so lockbox works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Snapshot file the CLI reads and writes.
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    /// Argon2 memory cost in KiB (default: 32 MB).
    #[serde(default = "default_kdf_memory_kib")]
    pub kdf_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,

    /// Bind address for `lockbox serve`.
    #[serde(default = "default_service_address")]
    pub service_address: String,

    /// Request-path prefix for `lockbox serve`.
    #[serde(default = "default_service_prefix")]
    pub service_prefix: String,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_snapshot_file() -> String {
    "lockbox.snapshot".to_string()
}

fn default_kdf_memory_kib() -> u32 {
    32_768 // 32 MB
}

fn default_kdf_iterations() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}

fn default_service_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_service_prefix() -> String {
    "secrets".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            snapshot_file: default_snapshot_file(),
            kdf_memory_kib: default_kdf_memory_kib(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
            service_address: default_service_address(),
            service_prefix: default_service_prefix(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the working directory.
    const FILE_NAME: &'static str = "lockbox.toml";

    /// Load settings from `<dir>/lockbox.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            LockboxError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// The Argon2 parameters configured here, in crypto-layer form.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.kdf_memory_kib,
            iterations: self.kdf_iterations,
            parallelism: self.kdf_parallelism,
        }
    }
}
