//! Metadata field classification.
//!
//! Fields whose name starts with [`META_PREFIX`] belong to the host
//! application (view bindings, caches, local bookkeeping). They are kept in
//! place on merge but never diffed, deleted or sent to observers.

/// Leading character that marks a metadata field.
pub const META_PREFIX: char = '$';

/// Returns `true` if `key` names a metadata field.
///
/// ```
/// use json_context_value::is_meta;
///
/// assert!(is_meta("$view"));
/// assert!(!is_meta("title"));
/// assert!(!is_meta("_deleted"));
/// ```
#[inline]
pub fn is_meta(key: &str) -> bool {
    key.starts_with(META_PREFIX)
}
