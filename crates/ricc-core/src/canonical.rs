//! Canonical serialization — the sole path to digestible bytes.
//!
//! `CanonicalBytes` has a private inner field; the only way to construct one
//! is through `CanonicalBytes::new()`, which applies JSON Canonicalization
//! Scheme (RFC 8785) rules after a type-coercion pass: datetimes normalized
//! to UTC-with-`Z`-suffix at seconds precision. Numbers, including floats
//! (confidence scores, page-box dimensions), pass through for `serde_jcs` to
//! render per RFC 8785's number formatting.
//!
//! Every digest in this crate — evidence file hashes excepted, which hash
//! raw bytes via [`crate::sha256_bytes`] — flows through this type. That
//! makes "someone serialized with `serde_json::to_vec` and hashed that
//! instead" a compile error, not a code review finding.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by canonical (RFC 8785 JCS) serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::SerializationFailed`] if
    /// serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        Self::from_value(value)
    }

    /// Construct canonical bytes directly from a [`serde_json::Value`].
    pub fn from_value(value: Value) -> Result<Self, CanonicalizationError> {
        let coerced = coerce_json_value(value)?;
        let bytes = serialize_canonical(&coerced)?;
        Ok(Self(bytes))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Recursively coerce JSON values to the canonicalization contract:
///
/// 1. `null`, `bool`, `string`, `number` (including floats) — pass through
///    unchanged; `serde_jcs` renders numbers per RFC 8785.
/// 2. `object` — values recursed, keys left as-is (already strings in JSON).
/// 3. `array` — elements recursed.
/// 4. RFC3339 datetime strings are normalized to UTC, `Z` suffix, seconds
///    precision — matching [`crate::temporal::Timestamp`]'s own invariant,
///    so a `Timestamp` embedded via `Serialize` and a raw string read from
///    an upstream system canonicalize identically.
fn coerce_json_value(value: Value) -> Result<Value, CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value),
        Value::String(s) => Ok(Value::String(normalize_datetime_string(s))),
        Value::Object(map) => {
            let mut coerced = serde_json::Map::new();
            for (k, v) in map {
                coerced.insert(k, coerce_json_value(v)?);
            }
            Ok(Value::Object(coerced))
        }
        Value::Array(arr) => {
            let coerced: Result<Vec<_>, _> = arr.into_iter().map(coerce_json_value).collect();
            Ok(Value::Array(coerced?))
        }
    }
}

/// If `s` parses as an RFC3339 datetime, re-render it UTC with `Z` suffix at
/// seconds precision. Anything else passes through unchanged.
fn normalize_datetime_string(s: String) -> String {
    match DateTime::parse_from_rfc3339(&s) {
        Ok(dt) => dt.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        Err(_) => s,
    }
}

/// Serialize a JSON value in JCS-canonical form (RFC 8785): sorted keys,
/// compact separators, no trailing whitespace, UTF-8, non-ASCII preserved.
fn serialize_canonical(value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
    let s = serde_jcs::to_string(value)?;
    Ok(s.into_bytes())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            (-1e9f64..1e9f64).prop_map(|f| serde_json::json!(f)),
            "[a-zA-Z0-9_ ]{0,50}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,10}", inner, 0..8).prop_map(|m| {
                    let map: serde_json::Map<String, Value> = m.into_iter().collect();
                    Value::Object(map)
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn never_panics(value in json_value()) {
            prop_assert!(CanonicalBytes::new(&value).is_ok());
        }

        #[test]
        fn deterministic(value in json_value()) {
            let a = CanonicalBytes::new(&value).unwrap();
            let b = CanonicalBytes::new(&value).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }

        #[test]
        fn valid_utf8_and_json(value in json_value()) {
            let cb = CanonicalBytes::new(&value).unwrap();
            prop_assert!(std::str::from_utf8(cb.as_bytes()).is_ok());
            let parsed: Result<Value, _> = serde_json::from_slice(cb.as_bytes());
            prop_assert!(parsed.is_ok());
        }

        #[test]
        fn keys_sorted(keys in prop::collection::btree_set("[a-z]{1,8}", 2..6)) {
            let map: serde_json::Map<String, Value> = keys.iter()
                .enumerate()
                .map(|(i, k)| (k.clone(), serde_json::json!(i)))
                .collect();
            let cb = CanonicalBytes::new(&Value::Object(map)).unwrap();
            let parsed: serde_json::Map<String, Value> =
                serde_json::from_slice(cb.as_bytes()).unwrap();
            let output_keys: Vec<&String> = parsed.keys().collect();
            let mut sorted = output_keys.clone();
            sorted.sort();
            prop_assert_eq!(output_keys, sorted);
        }
    }
}
