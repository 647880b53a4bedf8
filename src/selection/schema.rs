//! Selection schema validation.
//!
//! Model output that parsed into JSON still has to carry the right fields.
//! The schemas are fixed, compiled once, and validation collects every
//! violation rather than stopping at the first so the corrective prompt can
//! name them all. The explicit escape field is honored before any schema
//! check runs.

use crate::selection::types::{
    ResourceChoice, ResourceSelection, SelectionError, ToolChoice, ToolSelection,
};
use jsonschema::Validator;
use serde_json::{json, Value};
use std::sync::LazyLock;

static TOOL_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    compile(json!({
        "type": "object",
        "properties": {
            "serverName": {"type": "string", "minLength": 1},
            "toolName": {"type": "string", "minLength": 1},
            "arguments": {"type": "object"},
            "reasoning": {"type": "string"}
        },
        "required": ["serverName", "toolName", "arguments"]
    }))
});

static RESOURCE_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    compile(json!({
        "type": "object",
        "properties": {
            "serverName": {"type": "string", "minLength": 1},
            "uri": {"type": "string", "minLength": 1},
            "reasoning": {"type": "string"}
        },
        "required": ["serverName", "uri"]
    }))
});

fn compile(schema: Value) -> Validator {
    jsonschema::validator_for(&schema).expect("built-in selection schema should compile")
}

/// Validates a parsed tool-selection payload.
pub fn validate_tool_selection(payload: &Value) -> Result<ToolChoice, SelectionError> {
    if escape_is_set(payload, "noToolAvailable") {
        return Ok(ToolChoice::NoneAvailable {
            reasoning: reasoning_of(payload),
        });
    }
    let errors = collect_errors(&TOOL_VALIDATOR, payload);
    if !errors.is_empty() {
        return Err(SelectionError::SchemaValidation(errors));
    }
    let selection: ToolSelection = serde_json::from_value(payload.clone()).map_err(|err| {
        SelectionError::SchemaValidation(vec![format!("Selection shape mismatch: {}", err)])
    })?;
    Ok(ToolChoice::Tool(selection))
}

/// Validates a parsed resource-selection payload.
pub fn validate_resource_selection(payload: &Value) -> Result<ResourceChoice, SelectionError> {
    if escape_is_set(payload, "noResourceAvailable") {
        return Ok(ResourceChoice::NoneAvailable {
            reasoning: reasoning_of(payload),
        });
    }
    let errors = collect_errors(&RESOURCE_VALIDATOR, payload);
    if !errors.is_empty() {
        return Err(SelectionError::SchemaValidation(errors));
    }
    let selection: ResourceSelection = serde_json::from_value(payload.clone()).map_err(|err| {
        SelectionError::SchemaValidation(vec![format!("Selection shape mismatch: {}", err)])
    })?;
    Ok(ResourceChoice::Resource(selection))
}

fn escape_is_set(payload: &Value, field: &str) -> bool {
    payload.get(field) == Some(&Value::Bool(true))
}

fn reasoning_of(payload: &Value) -> Option<String> {
    payload
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn collect_errors(validator: &Validator, payload: &Value) -> Vec<String> {
    validator
        .iter_errors(payload)
        .map(|error| {
            let path = error.instance_path().to_string();
            if path.is_empty() {
                error.to_string()
            } else {
                format!("{}: {}", path, error)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_tool_selection_validates() {
        let payload = json!({
            "serverName": "n8n",
            "toolName": "calculator",
            "arguments": {"input": "2+2"}
        });
        let choice = validate_tool_selection(&payload).expect("should validate");
        match choice {
            ToolChoice::Tool(selection) => {
                assert_eq!(selection.tool_name, "calculator");
                assert_eq!(selection.arguments["input"], "2+2");
            }
            other => panic!("unexpected choice: {:?}", other),
        }
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let err = validate_tool_selection(&json!({"serverName": "n8n"}))
            .expect_err("missing fields should fail");
        match err {
            SelectionError::SchemaValidation(errors) => {
                assert!(!errors.is_empty());
                let joined = errors.join("\n");
                assert!(joined.contains("toolName"));
                assert!(joined.contains("arguments"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn wrongly_typed_arguments_are_rejected() {
        let err = validate_tool_selection(&json!({
            "serverName": "n8n",
            "toolName": "calculator",
            "arguments": "2+2"
        }))
        .expect_err("string arguments should fail");
        match err {
            SelectionError::SchemaValidation(errors) => {
                assert!(errors.join("\n").contains("arguments"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn escape_field_bypasses_the_schema() {
        let choice = validate_tool_selection(&json!({
            "noToolAvailable": true,
            "reasoning": "nothing fits"
        }))
        .expect("escape should validate");
        assert_eq!(
            choice,
            ToolChoice::NoneAvailable {
                reasoning: Some("nothing fits".to_string())
            }
        );
    }

    #[test]
    fn false_escape_fields_still_require_a_selection() {
        let err = validate_tool_selection(&json!({"noToolAvailable": false}))
            .expect_err("false escape should fail");
        assert!(matches!(err, SelectionError::SchemaValidation(_)));
    }

    #[test]
    fn resource_selection_requires_a_uri() {
        let payload = json!({
            "serverName": "n8n",
            "uri": "mcp://n8n/synthetic/calculator"
        });
        let choice = validate_resource_selection(&payload).expect("should validate");
        assert!(matches!(choice, ResourceChoice::Resource(_)));

        let err = validate_resource_selection(&json!({"serverName": "n8n"}))
            .expect_err("missing uri should fail");
        match err {
            SelectionError::SchemaValidation(errors) => {
                assert!(errors.join("\n").contains("uri"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
