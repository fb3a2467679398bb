//! Canonical JSON encoding and content hashing.
//!
//! Snapshots are compared by the SHA-256 of their canonical encoding: object
//! keys sorted at every depth, no insignificant whitespace. Key order is
//! enforced here rather than relying on `serde_json::Map` ordering, which
//! changes when any crate in the graph enables `preserve_order`.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Encode a JSON value with keys sorted recursively.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Hex-encoded SHA-256 of the canonical encoding.
#[must_use]
pub fn content_hash(value: &Value) -> String {
    let digest = Sha256::digest(canonical_json(value).as_bytes());
    hex::encode(digest)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
