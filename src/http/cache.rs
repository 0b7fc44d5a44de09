//! Entity tag module
//!
//! Weak `ETag` generation and `If-None-Match` evaluation for conditional GETs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Generate a weak `ETag` from response content
///
/// Format: `W/"<len hex>-<hash hex>"`. Stable for identical content within
/// one process.
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    let v = hasher.finish();
    format!("W/\"{:x}-{v:x}\"", content.len())
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Uses weak comparison (the `W/` prefix is ignored on both sides) and
/// accepts comma-separated lists and the `*` wildcard.
///
/// Returns true if the client copy is fresh (respond 304).
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    let ours = strip_weak(etag);
    if_none_match.is_some_and(|client_etags| {
        client_etags.split(',').map(str::trim).any(|e| e == "*" || strip_weak(e) == ours)
    })
}

fn strip_weak(etag: &str) -> &str {
    etag.strip_prefix("W/").unwrap_or(etag)
}
