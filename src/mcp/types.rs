//! Capability descriptors and operation results.
//!
//! Providers report capabilities as JSON-RPC results; the types here are the
//! crate's own snapshots of that data, deserialized straight out of each
//! response's `result` value. They are deliberately local rather than the
//! protocol crate's types: the synthesizer constructs descriptors itself and
//! resources carry a `templateUri` the wire type has no room for.

use rust_mcp_schema::ContentBlock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A callable operation, as reported by `tools/list` at connect time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// A readable data endpoint. Real descriptors come from `resources/list`;
/// synthetic ones are fabricated around a tool by [`crate::mcp::synthetic`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_uri: Option<String>,
}

/// Parameterized counterpart of [`ResourceDescriptor`]. Synthetic templates
/// reuse the wrapped tool's input/output schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplateDescriptor {
    pub uri_template: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// Parse target for a `tools/list` result page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolListing {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Parse target for a `resources/list` result page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListing {
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Parse target for a `resources/templates/list` result page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplateListing {
    #[serde(default)]
    pub resource_templates: Vec<ResourceTemplateDescriptor>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Parse target for a `tools/call` result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallOutcome {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
}

impl ToolCallOutcome {
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Text of the first content block, when the provider returned text.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::TextContent(text) => Some(text.text.as_str()),
            _ => None,
        })
    }
}

/// One entry of a `resources/read` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

impl ResourceContents {
    /// JSON text body under the given URI, the shape every synthetic read
    /// produces.
    pub fn json(uri: impl Into<String>, value: &Value) -> Self {
        Self {
            uri: uri.into(),
            mime_type: Some("application/json".to_string()),
            text: Some(value.to_string()),
            blob: None,
        }
    }
}

/// Parse target for a `resources/read` result; also constructed directly by
/// the router for synthetic reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReadResult {
    #[serde(default)]
    pub contents: Vec<ResourceContents>,
}

impl ResourceReadResult {
    pub fn single(contents: ResourceContents) -> Self {
        Self {
            contents: vec![contents],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_listing_from_wire_shape() {
        let listing: ToolListing = serde_json::from_value(serde_json::json!({
            "tools": [
                {
                    "name": "weather",
                    "description": "Current conditions",
                    "inputSchema": {"type": "object", "properties": {"location": {"type": "string"}}}
                },
                {"name": "calculator"}
            ],
            "nextCursor": "page-2"
        }))
        .expect("listing should parse");

        assert_eq!(listing.tools.len(), 2);
        assert_eq!(listing.tools[0].name, "weather");
        assert!(listing.tools[0].input_schema.is_some());
        assert!(listing.tools[1].description.is_none());
        assert_eq!(listing.next_cursor.as_deref(), Some("page-2"));
    }

    #[test]
    fn parses_resource_listing_with_missing_fields() {
        let listing: ResourceListing = serde_json::from_value(serde_json::json!({
            "resources": [
                {"uri": "db://orders", "name": "Orders", "mimeType": "application/json"}
            ]
        }))
        .expect("listing should parse");

        assert_eq!(listing.resources.len(), 1);
        assert_eq!(listing.resources[0].mime_type.as_deref(), Some("application/json"));
        assert!(listing.resources[0].template_uri.is_none());
        assert!(listing.next_cursor.is_none());
    }

    #[test]
    fn tool_call_outcome_exposes_first_text() {
        let outcome: ToolCallOutcome = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "{\"temperature\":12}"}
            ],
            "isError": false
        }))
        .expect("outcome should parse");

        assert!(!outcome.is_error());
        assert_eq!(outcome.first_text(), Some("{\"temperature\":12}"));
    }

    #[test]
    fn json_contents_carry_mime_type() {
        let contents =
            ResourceContents::json("mcp://n8n/synthetic/calculator", &serde_json::json!({"ok": true}));
        assert_eq!(contents.mime_type.as_deref(), Some("application/json"));
        assert_eq!(contents.text.as_deref(), Some("{\"ok\":true}"));
    }
}
