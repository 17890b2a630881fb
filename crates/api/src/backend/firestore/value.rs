//! Conversion between plain JSON and Firestore's typed value encoding.
//!
//! Firestore REST documents wrap every value in a one-key object naming its
//! type (`{"stringValue": "x"}`, `{"integerValue": "3"}`, ...). Records are
//! serialized to plain JSON with `serde` first and then encoded here, so the
//! stored field names match the API's JSON field names.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value, json};

use crate::backend::BackendError;

/// A Firestore document as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name, ending in `/{collection}/{id}`.
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

impl Document {
    /// The document id (last path segment of `name`).
    #[must_use]
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    /// Decode the fields into `T`, with `id` set from the document name.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Decode` if a field has an unknown encoding or
    /// the result does not deserialize as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BackendError> {
        let mut object = decode_fields(&self.fields)?;
        object.insert("id".to_string(), Value::String(self.id().to_string()));
        serde_json::from_value(Value::Object(object))
            .map_err(|e| BackendError::Decode(format!("document {}: {e}", self.name)))
    }
}

/// Encode a JSON value as a Firestore value.
#[must_use]
pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or_default() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => {
            let values: Vec<Value> = values.iter().map(encode).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode every entry of a JSON object as a Firestore field.
#[must_use]
pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), encode(v))).collect()
}

/// Serialize a record and encode it as document fields, dropping `id`.
///
/// # Errors
///
/// Returns `BackendError::Decode` if the record does not serialize to a JSON
/// object.
pub fn to_fields<T: serde::Serialize>(record: &T) -> Result<Map<String, Value>, BackendError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(mut map)) => {
            map.remove("id");
            Ok(encode_fields(&map))
        }
        Ok(other) => Err(BackendError::Decode(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(BackendError::Decode(e.to_string())),
    }
}

/// Decode a Firestore value into plain JSON.
///
/// # Errors
///
/// Returns `BackendError::Decode` for unknown value types or malformed
/// integers.
pub fn decode(value: &Value) -> Result<Value, BackendError> {
    let Some(object) = value.as_object() else {
        return Err(BackendError::Decode(format!("not a Firestore value: {value}")));
    };
    let Some((kind, inner)) = object.iter().next() else {
        return Err(BackendError::Decode("empty Firestore value".to_string()));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or_default())),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| BackendError::Decode(format!("bad integerValue: {inner}")))
        }
        "doubleValue" => {
            let parsed = match inner {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| BackendError::Decode(format!("bad doubleValue: {inner}")))
        }
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Object(fields))
        }
        other => Err(BackendError::Decode(format!(
            "unsupported Firestore value type {other}"
        ))),
    }
}

/// Decode every field of a document.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, BackendError> {
    fields
        .iter()
        .map(|(k, v)| decode(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}
