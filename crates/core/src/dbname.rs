//! Database name sanitization (spec.md §3, §6.3).
//!
//! Database names are used as directory names on disk. Any character
//! invalid in a file name on the host platform is replaced with `_`.

/// Replace characters unsafe for a file/directory name with `_`.
///
/// The conservative cross-platform blocklist covers the characters invalid
/// on Windows (which is the tightest common denominator) so the same
/// sanitized name is reproducible regardless of where the process runs.
pub fn sanitize_db_name(name: &str) -> String {
    const INVALID: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];
    let sanitized: String = name
        .chars()
        .map(|c| if INVALID.contains(&c) { '_' } else { c })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}
