use regex::Regex;
use std::sync::LazyLock;

static NON_IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// Strip every character outside `[A-Za-z0-9_]`.
///
/// May return an empty string; callers treat that as a row error.
pub fn sanitize_identifier(raw: &str) -> String {
    NON_IDENTIFIER_RE.replace_all(raw, "").into_owned()
}
