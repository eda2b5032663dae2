//! Utility functions and helpers.

pub mod http;
pub mod log;

/// Account handle as the platform expects it: trimmed, without a leading `@`.
pub fn normalize_handle(raw: &str) -> Option<String> {
    let handle = raw.trim().trim_start_matches('@').trim();
    (!handle.is_empty()).then(|| handle.to_string())
}

/// File-name friendly form of a hashtag or query.
pub fn slugify(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}
