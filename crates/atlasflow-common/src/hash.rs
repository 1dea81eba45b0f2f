//! Content hashing for payload deduplication
//!
//! The raw store deduplicates records by a digest of their payload. The
//! digest must be deterministic and stable across runs and processes, so the
//! payload is first rendered in a canonical form (object keys sorted
//! recursively, no insignificant whitespace) and then hashed with SHA-256.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute the content hash of a JSON payload.
///
/// Returns a lowercase hex-encoded SHA-256 digest of the canonical rendering
/// of `payload`. Two payloads that differ only in object key order produce
/// the same hash.
pub fn content_hash(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    let mut canonical = String::new();
    write_canonical(payload, &mut canonical);
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Render a JSON value in canonical form into `out`.
///
/// Scalars are rendered exactly as serde_json renders them; objects are
/// rendered with keys in lexicographic order.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Map keys always serialize cleanly; fall back to a bare
                // quoted string if serde_json ever refuses one.
                match serde_json::to_string(key) {
                    Ok(encoded) => out.push_str(&encoded),
                    Err(_) => {
                        out.push('"');
                        out.push_str(key);
                        out.push('"');
                    },
                }
                out.push(':');
                if let Some(child) = map.get(key.as_str()) {
                    write_canonical(child, out);
                }
            }
            out.push('}');
        },
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        },
        scalar => {
            if let Ok(encoded) = serde_json::to_string(scalar) {
                out.push_str(&encoded);
            }
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_hash_is_deterministic() {
        let payload = json!({"id": 10, "status": "faturado", "itens": [1, 2, 3]});
        assert_eq!(content_hash(&payload), content_hash(&payload));
    }

    #[test]
    fn test_content_hash_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": 2, "x": 3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": 3, "y": 2}, "b": 1}"#).unwrap();
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_content_hash_distinguishes_payloads() {
        let a = json!({"id": 1});
        let b = json!({"id": 2});
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_content_hash_array_order_matters() {
        let a = json!([1, 2]);
        let b = json!([2, 1]);
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_content_hash_known_value() {
        // SHA-256 of the canonical string `{"a":1}`
        let payload = json!({"a": 1});
        assert_eq!(
            content_hash(&payload),
            "015abd7f5cc57a2dd94b7590f04ad8084273905ee33ec5cebeae62276a97f862"
        );
    }
}
