//! Cache Key Builder
//!
//! Encodes an operation name and its argument set into a deterministic key.
//! Arguments are canonicalised (object keys sorted recursively) before hashing,
//! so property insertion order never changes the key.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

/// Separator between the readable operation prefix and the argument digest.
pub const KEY_SEPARATOR: char = '~';

// == Build Key ==
/// Builds the cache key for `operation` called with `args`.
///
/// The key has the form `<operation>~<sha256 hex>`. The readable prefix keeps
/// keys greppable in a storage backend; the digest covers both the operation
/// and the canonical argument encoding.
///
/// # Errors
/// `InvalidArguments` if the arguments cannot be serialized, are not a map
/// (or unit), or the operation name is empty.
pub fn build_key<A>(operation: &str, args: &A) -> Result<String>
where
    A: Serialize + ?Sized,
{
    if operation.is_empty() {
        return Err(CacheError::InvalidArguments(
            "operation name cannot be empty".to_string(),
        ));
    }

    let args = serde_json::to_value(args)
        .map_err(|e| CacheError::InvalidArguments(format!("{operation}: {e}")))?;

    let canonical = match args {
        Value::Null => Value::Object(Map::new()),
        Value::Object(_) => canonicalize(&args),
        other => {
            return Err(CacheError::InvalidArguments(format!(
                "{operation}: argument set must be a map, got {}",
                json_kind(&other)
            )))
        }
    };

    let encoded = serde_json::to_string(&canonical)
        .map_err(|e| CacheError::InvalidArguments(format!("{operation}: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update([0u8]);
    hasher.update(encoded.as_bytes());

    Ok(format!(
        "{operation}{KEY_SEPARATOR}{}",
        hex::encode(hasher.finalize())
    ))
}

/// Returns the operation prefix of a key built by [`build_key`].
pub fn operation_of(key: &str) -> &str {
    key.split_once(KEY_SEPARATOR).map_or(key, |(op, _)| op)
}

/// Sort JSON object keys recursively.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by_key(|(k, _)| *k);
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        _ => value.clone(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_same_args_same_key() {
        let a = build_key("users", &json!({"page": 1, "size": 3})).unwrap();
        let b = build_key("users", &json!({"page": 1, "size": 3})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_insertion_order_ignored() {
        let mut first = Map::new();
        first.insert("size".to_string(), json!(3));
        first.insert("page".to_string(), json!(1));

        let mut second = Map::new();
        second.insert("page".to_string(), json!(1));
        second.insert("size".to_string(), json!(3));

        assert_eq!(
            build_key("users", &first).unwrap(),
            build_key("users", &second).unwrap()
        );
    }

    #[test]
    fn test_different_args_different_key() {
        let a = build_key("users", &json!({"page": 1})).unwrap();
        let b = build_key("users", &json!({"page": 2})).unwrap();
        let c = build_key("users", &json!({"page": "1"})).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_different_operation_different_key() {
        let a = build_key("user", &json!({"id": 1})).unwrap();
        let b = build_key("group", &json!({"id": 1})).unwrap();
        assert_ne!(a, b);
        assert_eq!(operation_of(&a), "user");
        assert_eq!(operation_of(&b), "group");
    }

    #[test]
    fn test_unit_and_empty_map_agree() {
        let unit = build_key("countries", &()).unwrap();
        let empty = build_key("countries", &json!({})).unwrap();
        assert_eq!(unit, empty);
    }

    #[test]
    fn test_struct_args() {
        #[derive(Serialize)]
        struct Page {
            page: u32,
            size: u32,
        }

        let typed = build_key("users", &Page { page: 2, size: 3 }).unwrap();
        let untyped = build_key("users", &json!({"size": 3, "page": 2})).unwrap();
        assert_eq!(typed, untyped);
    }

    #[test]
    fn test_non_map_arguments_rejected() {
        let result = build_key("users", &json!([1, 2]));
        assert!(matches!(result, Err(CacheError::InvalidArguments(_))));
    }

    #[test]
    fn test_unserializable_arguments_rejected() {
        // Non-string map keys cannot be encoded as JSON
        let mut args = HashMap::new();
        args.insert(vec![1u8], 1);
        let result = build_key("users", &args);
        assert!(matches!(result, Err(CacheError::InvalidArguments(_))));
    }

    #[test]
    fn test_empty_operation_rejected() {
        let result = build_key("", &json!({}));
        assert!(matches!(result, Err(CacheError::InvalidArguments(_))));
    }
}
