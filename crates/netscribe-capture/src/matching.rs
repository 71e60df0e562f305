//! Target-substring matching.
//!
//! A URL matches when the configured target is non-blank and occurs in the
//! URL as a literal, case-sensitive substring. No wildcard semantics.

/// Match against the raw target, as the request observer does.
pub fn matches_target(url: &str, target: &str) -> bool {
    if target.trim().is_empty() {
        return false;
    }
    url.contains(target)
}

/// Strip a leading `http://`/`https://` and one trailing `/`.
pub fn normalize_target(target: &str) -> &str {
    let stripped = target
        .strip_prefix("https://")
        .or_else(|| target.strip_prefix("http://"))
        .unwrap_or(target);
    stripped.strip_suffix('/').unwrap_or(stripped)
}

/// Match against the normalized target, as the page relay does.
pub fn matches_normalized(url: &str, target: &str) -> bool {
    if target.trim().is_empty() {
        return false;
    }
    let normalized = normalize_target(target);
    !normalized.is_empty() && url.contains(normalized)
}
