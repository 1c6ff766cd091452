//! Field Reference Resolution
//!
//! Flow plan fields come in three forms:
//!
//! - `"key": value` - a literal
//! - `"key.$": "$.input.path"` - a lookup into the flow input document
//! - `"key.=": "expression"` - an expression, which is not evaluated
//!
//! Lookups keep both the path and the value found there, because the
//! provenance graph needs to link back to where a value came from.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ProvError, Result};

/// Suffix marking a lookup key.
pub const LOOKUP_SUFFIX: &str = ".$";

/// Suffix marking an expression key.
pub const EXPRESSION_SUFFIX: &str = ".=";

/// A resolved field value.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    /// Value written directly in the flow plan.
    Literal(Value),
    /// Value looked up from the input document.
    Indirect { path: String, value: Value },
}

impl FieldValue {
    /// The effective value, regardless of how it was obtained.
    pub fn value(&self) -> &Value {
        match self {
            Self::Literal(value) => value,
            Self::Indirect { value, .. } => value,
        }
    }

    /// The lookup path, if this value came from the input document.
    pub fn lookup_path(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Indirect { path, .. } => Some(path),
        }
    }

    /// The effective value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        self.value().as_str()
    }

    /// Renders the effective value as text. Strings are returned bare,
    /// everything else as compact JSON.
    pub fn to_text(&self) -> String {
        match self.value() {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Resolves `key` from a set of raw fields.
///
/// Resolution order: literal key, then `key.$` lookup, then `key.=`
/// expression (rejected), otherwise the field is missing. A lookup key
/// holding anything but a path string is a `MalformedState` whose state
/// name is left for the caller to fill in.
pub fn resolve_field(fields: &Map<String, Value>, key: &str, input: &Value) -> Result<FieldValue> {
    if let Some(value) = fields.get(key) {
        return Ok(FieldValue::Literal(value.clone()));
    }

    let lookup_key = format!("{}{}", key, LOOKUP_SUFFIX);
    if let Some(path) = fields.get(&lookup_key) {
        let path = path.as_str().ok_or_else(|| ProvError::MalformedState {
            state: String::new(),
            message: format!("'{}' must hold a lookup path, found {}", lookup_key, path),
        })?;
        let value = lookup(input, path)?;
        return Ok(FieldValue::Indirect {
            path: path.to_string(),
            value: value.clone(),
        });
    }

    if fields.contains_key(&format!("{}{}", key, EXPRESSION_SUFFIX)) {
        return Err(ProvError::UnsupportedExpressionForm {
            key: key.to_string(),
        });
    }

    Err(ProvError::MissingField {
        key: key.to_string(),
    })
}

/// Walks a dot-separated path such as `$.input.compute_endpoint`.
///
/// Leading and trailing `$` and `.` characters are ignored. Numeric
/// segments index into arrays.
pub fn lookup<'a>(data: &'a Value, path: &str) -> Result<&'a Value> {
    let trimmed = path.trim_matches(|c| c == '$' || c == '.');
    if trimmed.is_empty() {
        return Ok(data);
    }

    let mut current = data;
    for segment in trimmed.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };

        current = next.ok_or_else(|| ProvError::MissingInputReference {
            path: path.to_string(),
            segment: segment.to_string(),
        })?;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input() -> Value {
        json!({
            "input": {
                "compute_endpoint": "58fb6f2d-ff78-4f39-9669-38c12d01f566",
                "RevTxt": {
                    "input_file": "/rev_text/input/test.txt",
                    "output_file": "/rev_text/output/test.txt"
                },
                "items": ["first", "second"]
            }
        })
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_literal_wins() {
        let f = fields(json!({"recursive": true, "recursive.$": "$.input.missing"}));
        let v = resolve_field(&f, "recursive", &input()).unwrap();
        assert_eq!(v, FieldValue::Literal(json!(true)));
        assert!(v.lookup_path().is_none());
    }

    #[test]
    fn test_lookup_keeps_path_and_value() {
        let f = fields(json!({"endpoint.$": "$.input.compute_endpoint"}));
        let v = resolve_field(&f, "endpoint", &input()).unwrap();
        assert_eq!(
            v,
            FieldValue::Indirect {
                path: "$.input.compute_endpoint".to_string(),
                value: json!("58fb6f2d-ff78-4f39-9669-38c12d01f566"),
            }
        );
        assert_eq!(v.lookup_path(), Some("$.input.compute_endpoint"));
    }

    #[test]
    fn test_lookup_nested_object() {
        let f = fields(json!({"payload.$": "$.input.RevTxt"}));
        let v = resolve_field(&f, "payload", &input()).unwrap();
        assert_eq!(v.value()["output_file"], json!("/rev_text/output/test.txt"));
    }

    #[test]
    fn test_lookup_missing_segment() {
        let f = fields(json!({"payload.$": "$.input.SortTxt"}));
        let err = resolve_field(&f, "payload", &input()).unwrap_err();
        match err {
            ProvError::MissingInputReference { path, segment } => {
                assert_eq!(path, "$.input.SortTxt");
                assert_eq!(segment, "SortTxt");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_expression_form_rejected() {
        let f = fields(json!({"source_path.=": "`$.RevTxt.details` + '.crate'"}));
        let err = resolve_field(&f, "source_path", &input()).unwrap_err();
        assert!(matches!(err, ProvError::UnsupportedExpressionForm { .. }));
    }

    #[test]
    fn test_lookup_path_must_be_string() {
        let f = fields(json!({"endpoint.$": 42}));
        let err = resolve_field(&f, "endpoint", &input()).unwrap_err();
        match err {
            ProvError::MalformedState { message, .. } => {
                assert!(message.contains("'endpoint.$'"));
                assert!(message.contains("42"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_field() {
        let err = resolve_field(&Map::new(), "endpoint", &input()).unwrap_err();
        assert!(matches!(err, ProvError::MissingField { key } if key == "endpoint"));
    }

    #[test]
    fn test_lookup_array_index() {
        assert_eq!(lookup(&input(), "$.input.items.1").unwrap(), &json!("second"));
        assert!(lookup(&input(), "$.input.items.5").is_err());
    }

    #[test]
    fn test_lookup_root() {
        let data = input();
        assert_eq!(lookup(&data, "$").unwrap(), &data);
    }

    #[test]
    fn test_to_text() {
        assert_eq!(FieldValue::Literal(json!("a/b")).to_text(), "a/b");
        assert_eq!(FieldValue::Literal(json!(false)).to_text(), "false");
    }
}
