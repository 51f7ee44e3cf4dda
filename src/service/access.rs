//! The authorization capability injected into every retrieval service.
//!
//! A callback receives `(token, caller address, resource, id)` for each
//! inbound request and decides whether the request may touch the store.

use std::sync::Arc;

use tracing::debug;

/// Per-request authorization decision.
///
/// Arguments: access token, caller network address, requested resource
/// path, normalized entry id (empty for whole-store operations).
pub type AccessCallback = Arc<dyn Fn(&str, &str, &str, &str) -> bool + Send + Sync>;

/// Grants access to every request.  Intended for tests and local tools.
pub fn full_access() -> AccessCallback {
    Arc::new(|_, _, _, _| true)
}

/// Denies every request.
pub fn no_access() -> AccessCallback {
    Arc::new(|_, _, _, _| false)
}

/// Grants access to every request and logs the arguments at debug level.
pub fn debug_access() -> AccessCallback {
    Arc::new(|token, addr, resource, id| {
        debug!(%token, %addr, %resource, %id, "access callback");
        true
    })
}
