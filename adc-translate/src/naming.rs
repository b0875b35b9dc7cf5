//! Path construction and generated identifiers.
//!
//! Tenant and application names are treated as opaque segments: a tenant
//! called `0.0.0.0` is just a string here.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Longest identifier [`hashed_id`] will produce.
pub const MAX_ID_LEN: usize = 64;
const HASH_CHARS: usize = 32;

/// `/tenant/`
pub fn partition_path(tenant: &str) -> String {
    format!("/{tenant}/")
}

/// `/tenant/app/`
pub fn folder_path(tenant: &str, app: &str) -> String {
    format!("/{tenant}/{app}/")
}

/// `/tenant/app/item`, or `/tenant/item` for tenant-level objects.
pub fn item_path(tenant: &str, app: Option<&str>, item: &str) -> String {
    match app {
        Some(app) => format!("/{tenant}/{app}/{item}"),
        None => format!("/{tenant}/{item}"),
    }
}

/// Name of the `index`-th object generated from one declared item: the bare
/// name first, then `name-1-`, `name-2-`, ...
pub fn indexed(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{base}-{index}-")
    }
}

/// Append a role suffix such as `-self` or `-Redirect-`.
pub fn with_role(base: &str, role: &str) -> String {
    format!("{base}{role}")
}

/// Stable identifier derived from `input`.
///
/// The input is canonicalized (object keys sorted, arrays kept as given)
/// before a SHA-256 digest is taken; callers that want order-insensitive
/// identity sort their arrays with [`canonical_sort`] first. The result is
/// `prefix` followed by lowercase hex, capped at [`MAX_ID_LEN`].
pub fn hashed_id(prefix: &str, input: &Value) -> String {
    let canonical = canonical_json(input);
    let digest = Sha256::digest(canonical.as_bytes());
    let encoded = hex::encode(digest);
    let room = MAX_ID_LEN.saturating_sub(prefix.len()).min(HASH_CHARS);
    format!("{prefix}{}", &encoded[..room])
}

/// Sort values by their canonical text, for order-insensitive hashing.
pub fn canonical_sort(values: &mut [Value]) {
    values.sort_by_cached_key(canonical_json);
}

/// Deterministic JSON text with object keys in sorted order.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&map[k])))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{body}}}")
        }
        Value::Array(items) => {
            let body = items.iter().map(canonical_json).collect::<Vec<_>>().join(",");
            format!("[{body}]")
        }
        other => other.to_string(),
    }
}

/// Build a JSON object from pairs; later keys win.
pub fn object<I, K>(pairs: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    Value::Object(
        pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect::<Map<String, Value>>(),
    )
}
