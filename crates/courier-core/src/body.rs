//! Request body descriptions.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::Serialize;

/// A request body in one of the transport-native or structured forms.
///
/// Text, binary and form bodies pass through the body serializer unchanged;
/// JSON bodies are encoded and tagged with `application/json` unless the
/// caller already set a content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// A plain text payload.
    Text(String),
    /// A raw binary payload.
    Binary(Bytes),
    /// URL-encoded form fields.
    Form(Vec<(String, String)>),
    /// A structured JSON payload.
    Json(serde_json::Value),
}

impl Body {
    /// Creates a text body.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Creates a binary body.
    pub fn binary(value: impl Into<Bytes>) -> Self {
        Self::Binary(value.into())
    }

    /// Creates a form body from key/value fields.
    pub fn form<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Form(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Creates a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialize`] when the value cannot be represented as
    /// JSON (e.g. a map with non-string keys).
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|err| Error::serialize("request body is not valid JSON", err))
    }

    /// Creates a JSON body from an already-built value.
    #[must_use]
    pub fn json_value(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::Binary(value)
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn json_body_encodes_serializable_values() {
        #[derive(Serialize)]
        struct User {
            name: &'static str,
        }

        let body = Body::json(&User { name: "alice" }).unwrap();
        assert_eq!(body, Body::Json(serde_json::json!({ "name": "alice" })));
    }

    #[test]
    fn json_body_rejects_non_string_keys() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "x");

        let err = Body::json(&map).unwrap_err();
        assert!(matches!(err, Error::Serialize { .. }));
    }

    #[test]
    fn form_body_keeps_field_order() {
        let body = Body::form([("a", "1"), ("b", "2")]);
        match body {
            Body::Form(fields) => {
                assert_eq!(fields[0], ("a".to_string(), "1".to_string()));
                assert_eq!(fields[1], ("b".to_string(), "2".to_string()));
            }
            other => panic!("expected form body, got {other:?}"),
        }
    }
}
