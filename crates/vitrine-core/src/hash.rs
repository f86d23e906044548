//! Content hashing for change detection.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the canonical JSON serialization of `content`.
///
/// Object keys serialize in sorted order, so two payloads that differ only in
/// key order hash identically.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use vitrine_core::content_hash;
///
/// let a = content_hash(&json!({"title": "Roadmap", "items": [1, 2]}));
/// let b = content_hash(&json!({"items": [1, 2], "title": "Roadmap"}));
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
pub fn content_hash(content: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(content));
    hex::encode(hasher.finalize())
}

// serde_json::Map is a BTreeMap without the preserve_order feature, which
// makes to_vec canonical.
fn canonical_bytes(content: &Value) -> Vec<u8> {
    serde_json::to_vec(content).unwrap_or_default()
}
