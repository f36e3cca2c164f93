//! Shared utility functions used across multiple modules.

use regex::Regex;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in seconds.
pub fn unix_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Extract the host portion of a URL, if it has one.
///
/// Matches any scheme, so `ftp://host/x` works too. Returns `None` for
/// scheme-less or malformed values.
pub fn host_of(url: &str) -> Option<String> {
    let re = Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://([^/?#:]+)").expect("Invalid regex");
    re.captures(url.trim())
        .map(|cap| cap[1].to_ascii_lowercase())
}
