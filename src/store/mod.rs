//! The entry store: identifier normalization, per-manager encrypted
//! tables, the manager registry and snapshot persistence.

pub mod id;
pub mod manager;
pub mod registry;
pub mod snapshot;

pub use id::{normalize_id, RECOVERY_SUFFIX};
pub use manager::Manager;
pub use registry::Registry;
pub use snapshot::Snapshot;
