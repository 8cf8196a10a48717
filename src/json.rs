//! JSON values for tool arguments and results
//!
//! Tool arguments and results are plain [`serde_json::Value`]s. Tools always
//! receive and return a JSON *object*, represented as [`JsonObject`]. Field
//! access goes through [`JsonObjectExt`], whose accessors fail with a
//! descriptive [`Error::InvalidInput`] instead of silently defaulting.
//!
//! ```rust
//! use agentloop::{JsonObject, JsonObjectExt};
//! use serde_json::json;
//!
//! let args: JsonObject = json!({"title": "Standup", "duration": 15})
//!     .as_object()
//!     .cloned()
//!     .unwrap_or_default();
//!
//! assert_eq!(args.str_field("title").unwrap(), "Standup");
//! assert_eq!(args.i64_field("duration").unwrap(), 15);
//! assert!(args.str_field("location").is_err());
//! assert_eq!(args.opt_str_field("location").unwrap(), None);
//! ```

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A JSON object, the shape of every tool argument set and tool result.
pub type JsonObject = Map<String, Value>;

/// Typed, fallible accessors over a [`JsonObject`].
pub trait JsonObjectExt {
    /// Required string field.
    fn str_field(&self, key: &str) -> Result<&str>;

    /// Optional string field. Present-but-not-a-string is still an error.
    fn opt_str_field(&self, key: &str) -> Result<Option<&str>>;

    /// Required integer field.
    fn i64_field(&self, key: &str) -> Result<i64>;

    /// Required numeric field (integers are accepted).
    fn f64_field(&self, key: &str) -> Result<f64>;

    /// Required boolean field.
    fn bool_field(&self, key: &str) -> Result<bool>;

    /// Required nested object.
    fn object_field(&self, key: &str) -> Result<&JsonObject>;

    /// Required array field.
    fn array_field(&self, key: &str) -> Result<&Vec<Value>>;
}

fn required<'a>(obj: &'a JsonObject, key: &str) -> Result<&'a Value> {
    obj.get(key)
        .ok_or_else(|| Error::invalid_input(format!("missing field '{}'", key)))
}

fn mistyped(key: &str, expected: &str, found: &Value) -> Error {
    Error::invalid_input(format!(
        "field '{}' must be {}, found {}",
        key,
        expected,
        type_name(found)
    ))
}

/// Short JSON type name used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl JsonObjectExt for JsonObject {
    fn str_field(&self, key: &str) -> Result<&str> {
        let value = required(self, key)?;
        value.as_str().ok_or_else(|| mistyped(key, "a string", value))
    }

    fn opt_str_field(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(mistyped(key, "a string", other)),
        }
    }

    fn i64_field(&self, key: &str) -> Result<i64> {
        let value = required(self, key)?;
        value.as_i64().ok_or_else(|| mistyped(key, "an integer", value))
    }

    fn f64_field(&self, key: &str) -> Result<f64> {
        let value = required(self, key)?;
        value.as_f64().ok_or_else(|| mistyped(key, "a number", value))
    }

    fn bool_field(&self, key: &str) -> Result<bool> {
        let value = required(self, key)?;
        value.as_bool().ok_or_else(|| mistyped(key, "a boolean", value))
    }

    fn object_field(&self, key: &str) -> Result<&JsonObject> {
        let value = required(self, key)?;
        value.as_object().ok_or_else(|| mistyped(key, "an object", value))
    }

    fn array_field(&self, key: &str) -> Result<&Vec<Value>> {
        let value = required(self, key)?;
        value.as_array().ok_or_else(|| mistyped(key, "an array", value))
    }
}

/// Coerce an arbitrary tool return value into an object.
///
/// Objects pass through; anything else is wrapped as `{"result": value}`.
pub fn into_object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("result".to_string(), other);
            map
        }
    }
}

/// Flatten an object into `key -> text` pairs for tool step details.
///
/// Strings are kept verbatim; every other value is rendered as compact JSON.
pub fn to_details(obj: &JsonObject) -> BTreeMap<String, String> {
    obj.iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}
