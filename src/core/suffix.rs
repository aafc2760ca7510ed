//! Suffix extraction and name normalization.
//!
//! A suffix is an uppercase routing tag carried as the last word of an
//! account or group name (`"Car LONG"` -> `LONG`). Suffixes partition bucket
//! accounts into independently balanced subsets. The same rule applies to
//! account names and group names everywhere in the engine, so it lives here
//! and is never reimplemented elsewhere.

/// Extracts the routing suffix from a name.
///
/// Returns the last whitespace-separated token if and only if the name has
/// two or more tokens and that token consists solely of uppercase ASCII
/// letters. Single-word names, empty strings and names whose last token is
/// not purely uppercase yield `None`.
#[must_use]
pub fn extract_suffix(name: &str) -> Option<&str> {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    // A single-token name has no suffix, even if fully uppercase.
    if tokens.len() < 2 {
        return None;
    }
    let last = tokens[tokens.len() - 1];
    if last.bytes().all(|b| b.is_ascii_uppercase()) {
        Some(last)
    } else {
        None
    }
}

/// Normalizes a name for use in remote identifiers and back-reference
/// hashtags: lowercased, whitespace runs collapsed to single underscores.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}
