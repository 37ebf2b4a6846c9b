//! JSON Document Codec
//!
//! Wraps `serde_json` behind the flat string-to-string mapping the devices
//! store. The root must be an object and every value must be a string; the
//! codec reports each deviation as its own error kind so callers can
//! distinguish a torn document from a mistyped key.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// The flat string-to-string mapping stored on every replica.
#[derive(Debug, Clone, Default)]
pub struct Document {
    map: Map<String, Value>,
}

impl Document {
    /// Create an empty document (`{}`).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a document from its compact serialised form.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(Error::JsonParse)?;
        match value {
            Value::Object(map) => Ok(Self { map }),
            _ => Err(Error::JsonRootNotObject),
        }
    }

    /// Fetch the value of `key` as a string.
    pub fn get(&self, key: &str) -> Result<&str> {
        match self.map.get(key) {
            None => Err(Error::KeyNotFound(key.to_owned())),
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(Error::KeyNotString(key.to_owned())),
        }
    }

    /// Whether `key` is present, regardless of its value type.
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or replace the mapping `key` -> `value`.
    pub fn insert(&mut self, key: &str, value: &str) {
        self.map
            .insert(key.to_owned(), Value::String(value.to_owned()));
    }

    /// Delete the mapping for `key`, reporting whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.map.remove(key).is_some()
    }

    /// The currently-defined keys. Order is unspecified.
    pub fn keys(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }

    /// All key/value pairs. Fails if any value is not a string.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        self.map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => Ok((k.clone(), s.clone())),
                _ => Err(Error::KeyNotString(k.clone())),
            })
            .collect()
    }

    /// Whether the document holds no keys.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Serialise in compact form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.map).map_err(Error::Json)
    }
}

// =============================================================================
// Tests
// =============================================================================
