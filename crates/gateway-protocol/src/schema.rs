//! Minimal structural validator for the JSON-Schema subset tool definitions
//! use for `outputSchema`: `type`, `required`, and `properties`, recursing
//! into nested objects and array items. Not a general-purpose validator —
//! adapters are expected to declare simple output shapes, and this only
//! needs to catch a response that doesn't match what was declared.

use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("at {path}: expected type '{expected}', got '{actual}'")]
    TypeMismatch { path: String, expected: String, actual: String },
    #[error("at {path}: missing required field '{field}'")]
    MissingRequired { path: String, field: String },
}

pub fn validate(schema: &Value, data: &Value) -> Result<(), SchemaError> {
    validate_at("$", schema, data)
}

fn validate_at(path: &str, schema: &Value, data: &Value) -> Result<(), SchemaError> {
    let Some(expected_type) = schema.get("type").and_then(Value::as_str) else {
        return Ok(());
    };

    if !matches_type(expected_type, data) {
        return Err(SchemaError::TypeMismatch {
            path: path.to_string(),
            expected: expected_type.to_string(),
            actual: json_type_name(data).to_string(),
        });
    }

    if expected_type == "object" {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for field in required {
                let Some(field) = field.as_str() else { continue };
                if data.get(field).is_none() {
                    return Err(SchemaError::MissingRequired { path: path.to_string(), field: field.to_string() });
                }
            }
        }
        if let (Some(properties), Value::Object(map)) = (schema.get("properties").and_then(Value::as_object), data) {
            for (key, property_schema) in properties {
                if let Some(value) = map.get(key) {
                    validate_at(&format!("{path}.{key}"), property_schema, value)?;
                }
            }
        }
    }

    if expected_type == "array" {
        if let (Some(items_schema), Value::Array(items)) = (schema.get("items"), data) {
            for (index, item) in items.iter().enumerate() {
                validate_at(&format!("{path}[{index}]"), items_schema, item)?;
            }
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
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

    #[test]
    fn accepts_matching_object_shape() {
        let schema = json!({"type": "object", "required": ["temp"], "properties": {"temp": {"type": "number"}}});
        assert!(validate(&schema, &json!({"temp": 21.5})).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let schema = json!({"type": "object", "required": ["temp"]});
        assert_eq!(
            validate(&schema, &json!({})),
            Err(SchemaError::MissingRequired { path: "$".to_string(), field: "temp".to_string() })
        );
    }

    #[test]
    fn rejects_type_mismatch_on_nested_property() {
        let schema = json!({"type": "object", "properties": {"temp": {"type": "number"}}});
        let err = validate(&schema, &json!({"temp": "warm"})).unwrap_err();
        assert_eq!(err, SchemaError::TypeMismatch { path: "$.temp".to_string(), expected: "number".to_string(), actual: "string".to_string() });
    }

    #[test]
    fn schema_without_type_is_permissive() {
        assert!(validate(&json!({}), &json!("anything")).is_ok());
    }
}
