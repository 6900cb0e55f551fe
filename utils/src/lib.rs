//! # Faultline Utilities
//!
//! Common helpers for hashing, text truncation and HTML escaping.
//!
//! # Best Practices
//!
//! - Uses SHA-2 for stable hashing
//! - Truncation is char-based so multi-byte messages never split a code point

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Compute SHA-256 hash of content string
///
/// # Examples
///
/// ```
/// use utils::compute_content_hash;
///
/// let hash = compute_content_hash("hello world");
/// assert_eq!(hash.len(), 64);
/// ```
#[must_use]
pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compute SHA-256 hash over several parts.
///
/// Parts are separated by a NUL byte so `("ab", "c")` and `("a", "bc")` never
/// collide.
#[must_use]
pub fn compute_parts_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Generate UUID v4
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Truncate to at most `max_chars` characters, appending `...` when cut.
///
/// The result never exceeds `max_chars` characters.
///
/// ```
/// use utils::truncate_with_ellipsis;
///
/// assert_eq!(truncate_with_ellipsis("hello world", 8), "hello...");
/// assert_eq!(truncate_with_ellipsis("short", 8), "short");
/// ```
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }
    let mut out: String = text.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}

/// Take the first `max_chars` characters without any marker.
#[must_use]
pub fn take_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Escape text for inclusion in HTML bodies (email, Telegram).
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c)
        }
    }
    out
}

/// Escape an optional value; `None` renders as an empty string.
#[must_use]
pub fn escape_html_opt(text: Option<&str>) -> String {
    text.map(escape_html).unwrap_or_default()
}

/// Hostname of the current machine, best effort.
#[must_use]
pub fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
