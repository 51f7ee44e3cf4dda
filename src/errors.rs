use thiserror::Error;

/// All errors that can occur in lockbox.
#[derive(Debug, Error)]
pub enum LockboxError {
    // --- Entry store errors ---
    #[error("Entry '{0}' not found")]
    NotFound(String),

    #[error("Decryption failed — wrong password or corrupted data")]
    AuthFailure,

    #[error("Stored value does not match the provided value")]
    ValueMismatch,

    #[error("Precondition failed — stored value for '{0}' differs from the expected old value")]
    PreconditionFailed(String),

    // --- Registry errors ---
    #[error("Manager '{0}' is already registered")]
    AlreadyExists(String),

    #[error("Manager '{0}' not found")]
    ManagerNotFound(String),

    #[error("No default manager is set")]
    NoDefaultManager,

    // --- Retrieval service errors ---
    #[error("Service already running on {address}{prefix}")]
    AlreadyRunning { address: String, prefix: String },

    #[error("No service running on {address}{prefix}")]
    ServiceNotRunning { address: String, prefix: String },

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    Crypto(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- General errors ---
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Config file error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Convenience type alias for lockbox results.
pub type Result<T> = std::result::Result<T, LockboxError>;
