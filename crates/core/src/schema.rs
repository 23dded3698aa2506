//! Argument validation against the JSON-schema subset tools declare.
//!
//! Supported keywords: `type` (including `integer`), `properties`,
//! `required`, `additionalProperties: false`, `enum`, `minLength`,
//! `minimum`, `maximum`, and `items`. Anything else is ignored.

use serde_json::Value;

/// Validate `value` against `schema`. On failure returns every problem found,
/// joined into one human-readable reason the model can act on.
pub fn validate(schema: &Value, value: &Value) -> Result<(), String> {
    let mut errors = Vec::new();
    check(schema, value, "", &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    let actual = type_name(value);
    expected == actual || (expected == "number" && actual == "integer")
}

fn field(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn check(schema: &Value, value: &Value, path: &str, errors: &mut Vec<String>) {
    let at = if path.is_empty() { "arguments" } else { path };

    if let Some(expected) = schema.get("type").and_then(Value::as_str)
        && !type_matches(expected, value)
    {
        errors.push(format!("{at}: expected {expected}, got {}", type_name(value)));
        return;
    }

    if let Some(Value::Array(allowed)) = schema.get("enum")
        && !allowed.contains(value)
    {
        let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
        errors.push(format!("{at}: must be one of {}", options.join(", ")));
    }

    match value {
        Value::Object(obj) => {
            if let Some(Value::Array(required)) = schema.get("required") {
                for name in required.iter().filter_map(Value::as_str) {
                    if obj.get(name).is_none_or(Value::is_null) {
                        errors.push(format!("{}: required field is missing", field(path, name)));
                    }
                }
            }

            let properties = schema.get("properties").and_then(Value::as_object);
            let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));
            for (name, item) in obj {
                match properties.and_then(|p| p.get(name)) {
                    // Optional fields may be sent as explicit nulls.
                    Some(_) if item.is_null() => {}
                    Some(sub) => check(sub, item, &field(path, name), errors),
                    None if closed => errors.push(format!("{}: unknown field", field(path, name))),
                    None => {}
                }
            }
        }
        Value::String(s) => {
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64)
                && (s.trim().chars().count() as u64) < min
            {
                errors.push(format!("{at}: must be at least {min} characters"));
            }
        }
        Value::Number(n) => {
            if let (Some(min), Some(v)) = (schema.get("minimum").and_then(Value::as_f64), n.as_f64())
                && v < min
            {
                errors.push(format!("{at}: must be at least {min}"));
            }
            if let (Some(max), Some(v)) = (schema.get("maximum").and_then(Value::as_f64), n.as_f64())
                && v > max
            {
                errors.push(format!("{at}: must be at most {max}"));
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{at}[{i}]"), errors);
                }
            }
        }
        _ => {}
    }
}
