//! Versioned serialization contract for top-level store values.
//!
//! Every value is written as `{"version": N, "value": <payload>}`. Values
//! written by older releases of the extension have no envelope and may be
//! either raw json or a json-encoded string; both are accepted on read and
//! rewritten in envelope form on the next write.

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use crate::storage::{KvStore, StoreError};

pub const SCHEMA_VERSION: u32 = 1;

pub const KEY_DATA: &str = "data";
pub const KEY_TAGS_COUNT_MAP: &str = "tagsCountMap";
pub const KEY_BROWSING_PATTERNS: &str = "browsingPatterns";
pub const KEY_CUSTOM_LABELS: &str = "customLabels";

pub fn encode<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(json!({
        "version": SCHEMA_VERSION,
        "value": serde_json::to_value(value)?,
    }))
}

/// Strip the envelope (or accept a legacy value) and return the payload.
pub fn unwrap_payload(key: &str, raw: Value) -> Result<Value, StoreError> {
    match raw {
        Value::Object(mut map)
            if map.len() == 2 && map.contains_key("version") && map.contains_key("value") =>
        {
            let found = map
                .get("version")
                .and_then(Value::as_u64)
                .ok_or_else(|| StoreError::Corrupted {
                    key: key.to_string(),
                    reason: "version is not an unsigned integer".to_string(),
                })?;

            if found > SCHEMA_VERSION as u64 {
                return Err(StoreError::UnsupportedVersion {
                    key: key.to_string(),
                    found: found as u32,
                    supported: SCHEMA_VERSION,
                });
            }

            Ok(map.remove("value").unwrap_or(Value::Null))
        }
        Value::String(encoded) => match serde_json::from_str::<Value>(&encoded) {
            Ok(value) => {
                log::debug!("decoded legacy json-string value of {key:?}");
                Ok(value)
            }
            Err(_) => Ok(Value::String(encoded)),
        },
        legacy => Ok(legacy),
    }
}

/// Decode a typed payload.
pub fn decode<T: DeserializeOwned>(key: &str, raw: Value) -> Result<T, StoreError> {
    let payload = unwrap_payload(key, raw)?;
    serde_json::from_value(payload).map_err(|err| StoreError::Corrupted {
        key: key.to_string(),
        reason: err.to_string(),
    })
}

/// Read and decode one key, falling back to `T::default()` when it's absent.
pub fn load<T: DeserializeOwned + Default>(store: &dyn KvStore, key: &str) -> Result<T, StoreError> {
    let mut values = store.get(&[key])?;
    match values.remove(key) {
        Some(Value::Null) | None => Ok(T::default()),
        Some(raw) => decode(key, raw),
    }
}

/// Like `load`, but a corrupted value is logged and read as `T::default()`.
pub fn load_or_default<T: DeserializeOwned + Default>(
    store: &dyn KvStore,
    key: &str,
) -> Result<T, StoreError> {
    match load(store, key) {
        Err(StoreError::Corrupted { key, reason }) => {
            log::warn!("ignoring corrupted value of {key:?}: {reason}");
            Ok(T::default())
        }
        other => other,
    }
}

/// Key a corrupted value is moved to before it gets overwritten.
pub fn corrupt_key(key: &str) -> String {
    format!("{key}.corrupt")
}

/// Read a key that is about to be rewritten.
///
/// A corrupted value is copied to `corrupt_key(key)` and `T::default()` is
/// returned, so the caller's write starts over instead of failing forever.
pub fn load_for_update<T: DeserializeOwned + Default>(
    store: &dyn KvStore,
    key: &str,
) -> Result<T, StoreError> {
    let mut values = store.get(&[key])?;
    let raw = match values.remove(key) {
        Some(Value::Null) | None => return Ok(T::default()),
        Some(raw) => raw,
    };

    match decode(key, raw.clone()) {
        Err(StoreError::Corrupted { reason, .. }) => {
            let aside = corrupt_key(key);
            log::warn!("value of {key:?} is corrupted ({reason}), moving it to {aside:?}");
            store.set(HashMap::from([(aside, raw)]))?;
            Ok(T::default())
        }
        other => other,
    }
}

/// Encode and write one key.
pub fn save<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> Result<(), StoreError> {
    store.set(HashMap::from([(key.to_string(), encode(value)?)]))
}
