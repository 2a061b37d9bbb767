//! Shared utility helpers.

/// Case-insensitive comparison of two trimmed strings without allocating.
#[inline]
pub fn eq_trimmed_ci(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}

/// True when `value` (trimmed, case-insensitive) is one of `markers`.
#[inline]
pub fn is_marker(value: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| eq_trimmed_ci(value, marker))
}

/// Replace characters that are unsafe in file names with `_`
pub fn file_safe_name(name: &str) -> String {
    let safe: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        "unnamed".to_string()
    } else {
        safe
    }
}
