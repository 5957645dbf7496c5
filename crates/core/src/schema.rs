//! Validation of tool input against its JSON Schema.
//!
//! Covers the subset tool specs use: `type`, `properties`, `required`,
//! `additionalProperties: false`, `enum`, `minimum`/`maximum` and `items`.
//! Optional properties explicitly set to `null` count as absent.

use serde_json::Value;

use crate::error::ToolError;

/// Check `value` against `schema`.
pub fn validate(schema: &Value, value: &Value) -> Result<(), ToolError> {
    check(schema, value, "input").map_err(ToolError::InvalidArguments)
}

fn check(schema: &Value, value: &Value, path: &str) -> Result<(), String> {
    if let Some(ty) = schema.get("type").and_then(Value::as_str) {
        if !matches_type(ty, value) {
            return Err(format!("{path} must be of type {ty}, got {}", type_name(value)));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            let choices: Vec<String> = allowed.iter().map(Value::to_string).collect();
            return Err(format!("{path} must be one of [{}]", choices.join(", ")));
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if n < min {
                return Err(format!("{path} must be >= {min}, got {n}"));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if n > max {
                return Err(format!("{path} must be <= {max}, got {n}"));
            }
        }
    }

    if let Some(object) = value.as_object() {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for key in &required {
            if object.get(*key).is_none_or(Value::is_null) {
                return Err(format!("{path}.{key} is required"));
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        for (key, field) in object {
            match properties.and_then(|p| p.get(key)) {
                Some(_) if field.is_null() && !required.contains(&key.as_str()) => {}
                Some(sub) => check(sub, field, &format!("{path}.{key}"))?,
                None if schema.get("additionalProperties") == Some(&Value::Bool(false)) => {
                    return Err(format!("{path}.{key} is not an accepted property"));
                }
                None => {}
            }
        }
    }

    if let (Some(items), Some(array)) = (schema.get("items"), value.as_array()) {
        for (i, item) in array.iter().enumerate() {
            check(items, item, &format!("{path}[{i}]"))?;
        }
    }

    Ok(())
}

fn matches_type(ty: &str, value: &Value) -> bool {
    match ty {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
