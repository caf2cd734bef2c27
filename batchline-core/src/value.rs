// Value trees for the Batchline protocol.
//
// Pipeline references and error values are special array forms on the wire.
// They are recognized once, while parsing, so the resolver works on a tagged
// sum instead of re-matching `["pipeline", ...]` at every step.

use serde_json::{json, Number, Value as JsonValue};
use std::collections::HashMap;

use crate::ids::ExportId;

/// A single selector in a pipeline reference path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKey {
    String(String),
    Index(usize),
}

impl PathKey {
    pub fn from_json(json: &JsonValue) -> Result<PathKey, ValueError> {
        if let Some(s) = json.as_str() {
            Ok(PathKey::String(s.to_string()))
        } else if let Some(n) = json.as_u64() {
            Ok(PathKey::Index(n as usize))
        } else {
            Err(ValueError::InvalidSelector(json.to_string()))
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            PathKey::String(s) => JsonValue::String(s.clone()),
            PathKey::Index(n) => JsonValue::Number(Number::from(*n)),
        }
    }
}

/// A JSON-like value tree as stored and resolved within a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
    /// `["error", kind, message]`
    Error { kind: String, message: String },
    /// `["pipeline", id, path?]`
    Pipeline { id: ExportId, path: Vec<PathKey> },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("path selector must be a string or non-negative integer, got {0}")]
    InvalidSelector(String),
}

impl Value {
    /// Parse a JSON value into a value tree, recognizing the special array
    /// forms. Only a pipeline reference carrying an invalid path selector
    /// fails; everything else parses.
    pub fn from_json(json: &JsonValue) -> Result<Value, ValueError> {
        match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::Number(n) => Ok(Value::Number(n.clone())),
            JsonValue::String(s) => Ok(Value::String(s.clone())),

            JsonValue::Array(items) => {
                if let Some(reference) = Self::as_pipeline_ref(items)? {
                    return Ok(reference);
                }
                if let Some(error) = Self::as_error_value(items) {
                    return Ok(error);
                }
                let items = items
                    .iter()
                    .map(Value::from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(items))
            }

            JsonValue::Object(map) => {
                let map = map
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Value::from_json(v)?)))
                    .collect::<Result<HashMap<_, _>, ValueError>>()?;
                Ok(Value::Object(map))
            }
        }
    }

    /// `["pipeline", id, path?]` where `id` is an integer. A missing or
    /// non-array path element means the reference targets the whole result.
    fn as_pipeline_ref(items: &[JsonValue]) -> Result<Option<Value>, ValueError> {
        if items.first().and_then(JsonValue::as_str) != Some("pipeline") {
            return Ok(None);
        }
        let Some(id) = items.get(1).and_then(JsonValue::as_i64) else {
            return Ok(None);
        };
        let path = match items.get(2).and_then(JsonValue::as_array) {
            Some(selectors) => selectors
                .iter()
                .map(PathKey::from_json)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(Some(Value::Pipeline {
            id: ExportId::new(id),
            path,
        }))
    }

    /// `["error", kind, message]`, all three elements strings.
    fn as_error_value(items: &[JsonValue]) -> Option<Value> {
        match items {
            [JsonValue::String(tag), JsonValue::String(kind), JsonValue::String(message)]
                if tag == "error" =>
            {
                Some(Value::Error {
                    kind: kind.clone(),
                    message: message.clone(),
                })
            }
            _ => None,
        }
    }

    /// Convert back to wire JSON.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(n) => JsonValue::Number(n.clone()),
            Value::String(s) => JsonValue::String(s.clone()),

            Value::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),

            Value::Object(map) => {
                JsonValue::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }

            Value::Error { kind, message } => json!(["error", kind, message]),

            Value::Pipeline { id, path } => {
                let mut arr = vec![json!("pipeline"), json!(id.value())];
                if !path.is_empty() {
                    arr.push(JsonValue::Array(path.iter().map(PathKey::to_json).collect()));
                }
                JsonValue::Array(arr)
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error { .. })
    }

    /// Short name of this value's shape, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Error { .. } => "error",
            Value::Pipeline { .. } => "pipeline reference",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(Value::from_json(&json!(null)).unwrap(), Value::Null);
        assert_eq!(Value::from_json(&json!(true)).unwrap(), Value::Bool(true));
        assert_eq!(
            Value::from_json(&json!("hi")).unwrap(),
            Value::String("hi".to_string())
        );
        assert_eq!(
            Value::from_json(&json!(42)).unwrap(),
            Value::Number(Number::from(42))
        );
    }

    #[test]
    fn test_parse_pipeline_reference() {
        let value = Value::from_json(&json!(["pipeline", 3])).unwrap();
        assert_eq!(
            value,
            Value::Pipeline {
                id: ExportId::new(3),
                path: vec![],
            }
        );

        let value = Value::from_json(&json!(["pipeline", 1, ["id", 0]])).unwrap();
        assert_eq!(
            value,
            Value::Pipeline {
                id: ExportId::new(1),
                path: vec![PathKey::String("id".to_string()), PathKey::Index(0)],
            }
        );
    }

    #[test]
    fn test_pipeline_without_integer_id_is_plain_array() {
        let value = Value::from_json(&json!(["pipeline", "nope"])).unwrap();
        assert!(matches!(value, Value::Array(_)));

        // A lone "pipeline" string in an array is not a reference either.
        let value = Value::from_json(&json!(["pipeline"])).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Value::String("pipeline".to_string())])
        );
    }

    #[test]
    fn test_pipeline_with_non_array_path_targets_whole_result() {
        let value = Value::from_json(&json!(["pipeline", 2, "oops"])).unwrap();
        assert_eq!(
            value,
            Value::Pipeline {
                id: ExportId::new(2),
                path: vec![],
            }
        );
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let err = Value::from_json(&json!(["pipeline", 1, [true]])).unwrap_err();
        assert!(matches!(err, ValueError::InvalidSelector(_)));

        let err = Value::from_json(&json!(["pipeline", 1, [-2]])).unwrap_err();
        assert!(matches!(err, ValueError::InvalidSelector(_)));
    }

    #[test]
    fn test_parse_error_value() {
        let value = Value::from_json(&json!(["error", "MethodError", "boom"])).unwrap();
        assert_eq!(
            value,
            Value::Error {
                kind: "MethodError".to_string(),
                message: "boom".to_string(),
            }
        );

        // Wrong arity or element types fall back to a plain array.
        let value = Value::from_json(&json!(["error", "MethodError"])).unwrap();
        assert!(matches!(value, Value::Array(_)));
        let value = Value::from_json(&json!(["error", 1, "boom"])).unwrap();
        assert!(matches!(value, Value::Array(_)));
    }

    #[test]
    fn test_round_trip() {
        let original = json!({
            "user": {"id": "u_1", "tags": ["a", "b"]},
            "ref": ["pipeline", 1, ["id"]],
            "err": ["error", "MethodError", "nope"],
            "n": 3.5,
        });
        let value = Value::from_json(&original).unwrap();
        assert_eq!(value.to_json(), original);
    }

    #[test]
    fn test_nested_reference_inside_object() {
        let value = Value::from_json(&json!({"key": ["pipeline", 7]})).unwrap();
        match value {
            Value::Object(map) => assert!(matches!(map["key"], Value::Pipeline { .. })),
            other => panic!("expected object, got {}", other.type_name()),
        }
    }
}
