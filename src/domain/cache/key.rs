//! Cache key derivation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::CacheError;

/// An opaque, deterministically derived cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps an already-derived key string
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the string representation of the key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key and returns the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// A normalized request payload to be fingerprinted
///
/// Components are kept in a `BTreeMap` so that insertion order never
/// influences the derived key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestPayload {
    /// Primary content (e.g., the prompt text)
    text: String,
    /// Secondary components (model id, parameters), sorted by name
    components: BTreeMap<String, String>,
}

impl RequestPayload {
    /// Creates a payload from primary text content
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            components: BTreeMap::new(),
        }
    }

    /// Adds a named component to the payload
    pub fn with_component(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.components.insert(key.into(), value.into());
        self
    }

    /// Creates a payload from any serializable value
    ///
    /// The value is rendered through `serde_json::Value`, whose object
    /// representation sorts keys, so two structurally equal values always
    /// produce the same payload text regardless of field order.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, CacheError> {
        let canonical = serde_json::to_value(value)
            .map_err(|e| CacheError::invalid_payload(format!("not serializable: {}", e)))?;
        let text = serde_json::to_string(&canonical)
            .map_err(|e| CacheError::invalid_payload(format!("not encodable: {}", e)))?;

        Ok(Self::new(text))
    }

    /// Primary text content of the payload
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Named components of the payload
    pub fn components(&self) -> &BTreeMap<String, String> {
        &self.components
    }
}

/// Derives cache keys from request payloads
///
/// Keys are the hex-encoded SHA-256 digest of the payload's canonical JSON
/// form. The digest is 256 bits, so distinct payloads colliding is not a
/// practical concern.
#[derive(Debug, Clone, Default)]
pub struct KeyDeriver;

impl KeyDeriver {
    /// Creates a new key deriver
    pub fn new() -> Self {
        Self
    }

    /// Derives the cache key for a payload
    pub fn derive(&self, payload: &RequestPayload) -> Result<CacheKey, CacheError> {
        let canonical = serde_json::to_string(payload)
            .map_err(|e| CacheError::invalid_payload(format!("not encodable: {}", e)))?;

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());

        Ok(CacheKey(hex::encode(hasher.finalize())))
    }

    /// Derives a key with a namespace prefix
    pub fn derive_with_namespace(
        &self,
        namespace: &str,
        payload: &RequestPayload,
    ) -> Result<CacheKey, CacheError> {
        let key = self.derive(payload)?;
        Ok(CacheKey(format!("{}:{}", namespace, key.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_new() {
        let payload = RequestPayload::new("summarize: X");
        assert_eq!(payload.text(), "summarize: X");
        assert!(payload.components().is_empty());
    }

    #[test]
    fn test_payload_with_components() {
        let payload = RequestPayload::new("hello")
            .with_component("model", "gpt-4")
            .with_component("temperature", "0.7");

        assert_eq!(payload.components().len(), 2);
        assert_eq!(
            payload.components().get("model"),
            Some(&"gpt-4".to_string())
        );
    }

    #[test]
    fn test_derive_is_deterministic() {
        let deriver = KeyDeriver::new();
        let payload = RequestPayload::new("hello").with_component("model", "gpt-4");

        let key1 = deriver.derive(&payload).unwrap();
        let key2 = deriver.derive(&payload).unwrap();
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_derive_ignores_component_insertion_order() {
        let deriver = KeyDeriver::new();
        let a = RequestPayload::new("hello")
            .with_component("zebra", "z")
            .with_component("apple", "a");
        let b = RequestPayload::new("hello")
            .with_component("apple", "a")
            .with_component("zebra", "z");

        assert_eq!(deriver.derive(&a).unwrap(), deriver.derive(&b).unwrap());
    }

    #[test]
    fn test_derive_differs_by_text() {
        let deriver = KeyDeriver::new();
        let a = deriver.derive(&RequestPayload::new("hello")).unwrap();
        let b = deriver.derive(&RequestPayload::new("goodbye")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_differs_by_component() {
        let deriver = KeyDeriver::new();
        let a = deriver
            .derive(&RequestPayload::new("hello").with_component("model", "gpt-4"))
            .unwrap();
        let b = deriver
            .derive(&RequestPayload::new("hello").with_component("model", "claude-3-opus"))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_produces_hex_sha256() {
        let deriver = KeyDeriver::new();
        let key = deriver.derive(&RequestPayload::new("hello")).unwrap();

        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_derive_with_namespace() {
        let deriver = KeyDeriver::new();
        let payload = RequestPayload::new("hello");

        let key = deriver.derive_with_namespace("responses", &payload).unwrap();
        assert!(key.as_str().starts_with("responses:"));

        let bare = deriver.derive(&payload).unwrap();
        assert!(key.as_str().ends_with(bare.as_str()));
    }

    #[test]
    fn test_from_serializable_field_order_independent() {
        // serde_json::Value objects sort their keys, so two structs with
        // the same fields declared in different order canonicalize
        // identically
        #[derive(Serialize)]
        struct Forward {
            alpha: u32,
            beta: u32,
        }

        #[derive(Serialize)]
        struct Reversed {
            beta: u32,
            alpha: u32,
        }

        let p1 = RequestPayload::from_serializable(&Forward { alpha: 1, beta: 2 }).unwrap();
        let p2 = RequestPayload::from_serializable(&Reversed { beta: 2, alpha: 1 }).unwrap();

        assert_eq!(p1.text(), p2.text());
    }

    #[test]
    fn test_from_serializable_struct() {
        #[derive(Serialize)]
        struct Req {
            prompt: String,
            max_tokens: u32,
        }

        let payload = RequestPayload::from_serializable(&Req {
            prompt: "hi".to_string(),
            max_tokens: 100,
        })
        .unwrap();

        assert!(payload.text().contains("\"prompt\""));
        assert!(payload.text().contains("100"));
    }
}
