//! Validate tool call arguments against JSON Schema before execution.

/// Validate tool arguments against a JSON Schema.
///
/// Performs top-level validation: schema type check, required field presence,
/// and property type verification. Unlike a fail-fast validator, this collects
/// every violation so the model sees the complete correction signal in one
/// tool error message.
pub fn validate_arguments(
    args: &serde_json::Value,
    schema: &serde_json::Value,
) -> Result<(), Vec<String>> {
    let mut violations = Vec::new();

    if let Some(schema_type) = schema.get("type").and_then(|v| v.as_str()) {
        if schema_type == "object" && !args.is_object() {
            violations.push(format!(
                "expected object arguments, got {}",
                json_type_name(args)
            ));
            // Everything below needs an object to inspect.
            return Err(violations);
        }
    }

    if let (Some(required), Some(obj)) = (
        schema.get("required").and_then(|v| v.as_array()),
        args.as_object(),
    ) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            if !obj.contains_key(field) {
                violations.push(format!("missing required field '{field}'"));
            }
        }
    }

    if let (Some(properties), Some(obj)) = (
        schema.get("properties").and_then(|v| v.as_object()),
        args.as_object(),
    ) {
        for (key, value) in obj {
            let Some(prop_schema) = properties.get(key) else {
                continue;
            };
            if let Some(expected) = prop_schema.get("type").and_then(|v| v.as_str()) {
                if !value_matches_type(value, expected) {
                    violations.push(format!(
                        "field '{}' expected type '{}', got {}",
                        key,
                        expected,
                        json_type_name(value)
                    ));
                }
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn value_matches_type(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
