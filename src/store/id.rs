//! Identifier normalization.
//!
//! Raw identifiers may arrive with mixed case, mixed path separators and
//! leading slashes.  The normalized form is the only form used as a
//! storage key.

/// Suffix that marks an entry as a recovery shadow.
pub const RECOVERY_SUFFIX: &str = ".recovery";

/// Canonicalize a raw identifier into a storage key.
///
/// Backslashes are treated as forward slashes, the result is lowercased,
/// empty and `.` segments are dropped and `..` pops the previous segment.
/// Normalization is idempotent: `normalize_id(normalize_id(x)) ==
/// normalize_id(x)` for every input.
pub fn normalize_id(id: &str) -> String {
    let lowered = id.to_lowercase().replace('\\', "/");

    let mut segments: Vec<&str> = Vec::new();
    for segment in lowered.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    segments.join("/")
}

/// The recovery-shadow id for a given id.
pub fn recovery_id(id: &str) -> String {
    format!("{id}{RECOVERY_SUFFIX}")
}

/// Whether an id addresses a recovery shadow.
pub fn is_recovery_id(id: &str) -> bool {
    id.ends_with(RECOVERY_SUFFIX)
}
