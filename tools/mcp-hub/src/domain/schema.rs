//! Conversion between JSON-Schema-style `inputSchema` objects and the flat
//! parameter list stored on a [`Tool`].

use serde_json::{Map, Value, json};

use crate::domain::capability::{Prompt, Resource};
use crate::domain::tool::{Tool, ToolParameter};
use crate::shared::types::{InputSchema, RawPrompt, RawResource, RawTool};

/// Type assumed when a property does not declare one.
pub const DEFAULT_PARAM_TYPE: &str = "string";

/// One parameter per property, in property order.
pub fn schema_to_parameters(schema: &InputSchema) -> Vec<ToolParameter> {
    let Some(properties) = schema.properties.as_ref() else {
        return Vec::new();
    };
    let required = schema.required.as_deref().unwrap_or_default();
    properties
        .iter()
        .map(|(name, property)| ToolParameter {
            name: name.clone(),
            description: property_description(property),
            kind: Some(property_type(property)),
            required: required.iter().any(|r| r == name),
        })
        .collect()
}

pub fn parameters_to_schema(parameters: &[ToolParameter]) -> InputSchema {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in parameters {
        let mut property = Map::new();
        property.insert(
            "type".into(),
            Value::String(
                param
                    .kind
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PARAM_TYPE.to_string()),
            ),
        );
        if !param.description.is_empty() {
            property.insert("description".into(), json!(param.description));
        }
        properties.insert(param.name.clone(), Value::Object(property));
        if param.required {
            required.push(param.name.clone());
        }
    }
    InputSchema {
        schema_type: Some(Value::String("object".into())),
        properties: Some(properties),
        required: Some(required),
    }
}

pub fn tool_from_raw(raw: RawTool) -> Tool {
    let parameters = raw
        .input_schema
        .as_ref()
        .map(schema_to_parameters)
        .unwrap_or_default();
    Tool {
        name: raw.name,
        description: raw.description.unwrap_or_default(),
        parameters,
    }
}

pub fn prompt_from_raw(raw: RawPrompt) -> Prompt {
    let arguments = raw
        .arguments
        .unwrap_or_default()
        .into_iter()
        .filter(|arg| !arg.name.is_empty())
        .map(|arg| ToolParameter {
            name: arg.name,
            description: arg.description.unwrap_or_default(),
            kind: Some(DEFAULT_PARAM_TYPE.to_string()),
            required: arg.required.unwrap_or(false),
        })
        .collect();
    Prompt {
        name: raw.name,
        description: raw.description.unwrap_or_default(),
        arguments,
    }
}

pub fn resource_from_raw(raw: RawResource) -> Resource {
    Resource {
        uri: raw.uri,
        name: raw.name,
        description: raw.description.unwrap_or_default(),
        mime_type: raw.mime_type,
    }
}

fn property_description(property: &Value) -> String {
    property
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

// `type` may be a string, a union array such as ["string", "null"], or missing.
fn property_type(property: &Value) -> String {
    match property.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .find(|kind| *kind != "null")
            .unwrap_or(DEFAULT_PARAM_TYPE)
            .to_string(),
        _ => DEFAULT_PARAM_TYPE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::RawPromptArgument;

    fn schema(value: Value) -> InputSchema {
        serde_json::from_value(value).expect("schema")
    }

    #[test]
    fn typed_required_property() {
        let params = schema_to_parameters(&schema(json!({
            "properties": {"a": {"type": "integer", "description": "x"}},
            "required": ["a"]
        })));
        assert_eq!(
            params,
            vec![ToolParameter::new("a", "integer").describe("x").required()]
        );
    }

    #[test]
    fn missing_type_defaults_to_string() {
        let params = schema_to_parameters(&schema(json!({
            "properties": {"b": {}},
            "required": []
        })));
        assert_eq!(params, vec![ToolParameter::new("b", "string")]);
    }

    #[test]
    fn absent_properties_yield_nothing() {
        assert!(schema_to_parameters(&schema(json!({"type": "object"}))).is_empty());
        assert!(schema_to_parameters(&InputSchema::default()).is_empty());
    }

    #[test]
    fn property_order_is_preserved() {
        let params = schema_to_parameters(&schema(json!({
            "properties": {"zeta": {}, "alpha": {}, "mid": {}}
        })));
        let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn union_types_and_odd_descriptions() {
        let params = schema_to_parameters(&schema(json!({
            "properties": {
                "maybe": {"type": ["null", "number"]},
                "weird": {"description": 42},
                "bare": true
            }
        })));
        assert_eq!(params[0].kind.as_deref(), Some("number"));
        assert_eq!(params[1].description, "");
        assert_eq!(params[2].kind.as_deref(), Some("string"));
    }

    #[test]
    fn parameters_round_trip_through_schema() {
        let params = vec![
            ToolParameter::new("query", "string").describe("search text").required(),
            ToolParameter::new("limit", "integer"),
        ];
        let back = schema_to_parameters(&parameters_to_schema(&params));
        assert_eq!(back, params);
    }

    #[test]
    fn raw_tool_without_schema_has_no_parameters() {
        let tool = tool_from_raw(RawTool {
            name: "ping".into(),
            description: None,
            input_schema: None,
        });
        assert_eq!(tool, Tool::new("ping", ""));
    }

    #[test]
    fn prompt_arguments_become_string_parameters() {
        let prompt = prompt_from_raw(RawPrompt {
            name: "summarize".into(),
            description: Some("Summarize text".into()),
            arguments: Some(vec![
                RawPromptArgument {
                    name: "text".into(),
                    description: None,
                    required: Some(true),
                },
                RawPromptArgument::default(),
            ]),
        });
        assert_eq!(prompt.arguments, vec![ToolParameter::new("text", "string").required()]);
    }
}
