//! Synthetic resource generation.
//!
//! Every tool a server exposes is also made addressable as a resource. Two
//! tool names get fixed, well-known URIs shared across deployments; all other
//! tools get a deterministic per-server URI. The synthesized lists keep real
//! resources first so provider-reported entries always win on equal URIs.

use crate::mcp::types::{ResourceDescriptor, ResourceTemplateDescriptor, ToolDescriptor};

/// Fixed URI of the calculator wrapper; part of the external contract.
pub const CALCULATOR_SYNTHETIC_URI: &str = "mcp://n8n/synthetic/calculator";
/// Fixed template URI of the weather wrapper.
pub const WEATHER_SYNTHETIC_URI: &str = "mcp://n8n/synthetic/weather/{location}";
/// Prefix a concrete weather read must carry; the rest is the location.
pub const WEATHER_SYNTHETIC_PREFIX: &str = "mcp://n8n/synthetic/weather/";
pub(crate) const SYNTHETIC_URI_SCHEME: &str = "mcp://";
pub(crate) const SYNTHETIC_TOOL_INFIX: &str = "/synthetic/tool/";

const SYNTHETIC_MIME_TYPE: &str = "application/json";
const CALCULATOR_DESCRIPTION: &str =
    "Synthetic resource wrapping the calculator tool. Evaluate expressions by \
     calling the tool; the resource itself has no readable state.";
const WEATHER_DESCRIPTION: &str =
    "Synthetic resource wrapping the weather tool. Substitute {location} to \
     read conditions for a place by name.";

/// Combined capability lists for one connection after synthesis.
#[derive(Debug, Default)]
pub struct SynthesizedCapabilities {
    pub resources: Vec<ResourceDescriptor>,
    pub resource_templates: Vec<ResourceTemplateDescriptor>,
}

/// Builds the final resource and template lists for a connection: real
/// entries first, then calculator/weather specials, then generic per-tool
/// wrappers. Duplicate URIs are skipped, never replaced.
pub fn synthesize_capabilities(
    server: &str,
    tools: &[ToolDescriptor],
    real_resources: Vec<ResourceDescriptor>,
    real_templates: Vec<ResourceTemplateDescriptor>,
) -> SynthesizedCapabilities {
    let server_reported_resources = !real_resources.is_empty();
    let mut resources = real_resources;
    let mut templates = real_templates;

    for tool in tools {
        match tool.name.as_str() {
            "calculator" => {
                push_unique_resource(&mut resources, calculator_resource());
                push_unique_template(&mut templates, calculator_template(tool));
            }
            "weather" => {
                push_unique_resource(&mut resources, weather_resource());
                push_unique_template(&mut templates, weather_template(tool));
            }
            _ => {}
        }
    }

    for tool in tools {
        // Special tools fall through to a generic wrapper only when the
        // server reported no resources of its own.
        if is_special_tool(&tool.name) && server_reported_resources {
            continue;
        }
        push_unique_resource(&mut resources, generic_resource(server, tool));
        push_unique_template(&mut templates, generic_template(server, tool));
    }

    SynthesizedCapabilities {
        resources,
        resource_templates: templates,
    }
}

/// Deterministic URI for a generic per-tool wrapper.
pub fn generic_tool_uri(server: &str, tool: &str) -> String {
    format!("{}{}{}{}", SYNTHETIC_URI_SCHEME, server, SYNTHETIC_TOOL_INFIX, tool)
}

/// Turns `get_weather` or `fetch-data` into `Get Weather` / `Fetch Data`.
pub(crate) fn display_name(tool: &str) -> String {
    tool.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn is_special_tool(name: &str) -> bool {
    matches!(name, "calculator" | "weather")
}

fn calculator_resource() -> ResourceDescriptor {
    ResourceDescriptor {
        uri: CALCULATOR_SYNTHETIC_URI.to_string(),
        name: "Calculator".to_string(),
        description: Some(CALCULATOR_DESCRIPTION.to_string()),
        mime_type: Some(SYNTHETIC_MIME_TYPE.to_string()),
        template_uri: None,
    }
}

fn calculator_template(tool: &ToolDescriptor) -> ResourceTemplateDescriptor {
    ResourceTemplateDescriptor {
        uri_template: CALCULATOR_SYNTHETIC_URI.to_string(),
        name: "Calculator".to_string(),
        description: Some(CALCULATOR_DESCRIPTION.to_string()),
        mime_type: Some(SYNTHETIC_MIME_TYPE.to_string()),
        input_schema: tool.input_schema.clone(),
        output_schema: tool.output_schema.clone(),
    }
}

fn weather_resource() -> ResourceDescriptor {
    ResourceDescriptor {
        uri: WEATHER_SYNTHETIC_URI.to_string(),
        name: "Weather".to_string(),
        description: Some(WEATHER_DESCRIPTION.to_string()),
        mime_type: Some(SYNTHETIC_MIME_TYPE.to_string()),
        template_uri: Some(WEATHER_SYNTHETIC_URI.to_string()),
    }
}

fn weather_template(tool: &ToolDescriptor) -> ResourceTemplateDescriptor {
    ResourceTemplateDescriptor {
        uri_template: WEATHER_SYNTHETIC_URI.to_string(),
        name: "Weather".to_string(),
        description: Some(WEATHER_DESCRIPTION.to_string()),
        mime_type: Some(SYNTHETIC_MIME_TYPE.to_string()),
        input_schema: tool.input_schema.clone(),
        output_schema: tool.output_schema.clone(),
    }
}

fn generic_description(tool: &ToolDescriptor) -> Option<String> {
    tool.description
        .clone()
        .or_else(|| Some(format!("Synthetic resource wrapping the '{}' tool.", tool.name)))
}

fn generic_resource(server: &str, tool: &ToolDescriptor) -> ResourceDescriptor {
    ResourceDescriptor {
        uri: generic_tool_uri(server, &tool.name),
        name: display_name(&tool.name),
        description: generic_description(tool),
        mime_type: Some(SYNTHETIC_MIME_TYPE.to_string()),
        template_uri: None,
    }
}

fn generic_template(server: &str, tool: &ToolDescriptor) -> ResourceTemplateDescriptor {
    ResourceTemplateDescriptor {
        uri_template: generic_tool_uri(server, &tool.name),
        name: display_name(&tool.name),
        description: generic_description(tool),
        mime_type: Some(SYNTHETIC_MIME_TYPE.to_string()),
        input_schema: tool.input_schema.clone(),
        output_schema: tool.output_schema.clone(),
    }
}

fn push_unique_resource(resources: &mut Vec<ResourceDescriptor>, candidate: ResourceDescriptor) {
    if resources.iter().any(|existing| existing.uri == candidate.uri) {
        return;
    }
    resources.push(candidate);
}

fn push_unique_template(
    templates: &mut Vec<ResourceTemplateDescriptor>,
    candidate: ResourceTemplateDescriptor,
) {
    if templates
        .iter()
        .any(|existing| existing.uri_template == candidate.uri_template)
    {
        return;
    }
    templates.push(candidate);
}
