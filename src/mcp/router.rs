//! Resource read dispatch.
//!
//! Synthetic URIs are answered locally and everything else is forwarded to
//! the provider. Dispatch order is fixed: the calculator special first, then
//! the weather prefix, then the generic per-tool pattern, then a native read.

use crate::mcp::error::ResourceReadError;
use crate::mcp::manager::ConnectionManager;
use crate::mcp::synthetic::{
    CALCULATOR_SYNTHETIC_URI, SYNTHETIC_TOOL_INFIX, SYNTHETIC_URI_SCHEME, WEATHER_SYNTHETIC_PREFIX,
};
use crate::mcp::types::{ResourceContents, ResourceReadResult};
use rust_mcp_schema::ContentBlock;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

const CALCULATOR_TOOL: &str = "calculator";
const WEATHER_TOOL: &str = "weather";
const WEATHER_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves one resource read against `server`.
///
/// Synthetic reads never invoke the wrapped tool except on the weather path,
/// which probes the live tool and falls back to a placeholder on any failure.
pub async fn read_resource(
    manager: &mut ConnectionManager,
    server: &str,
    uri: &str,
) -> Result<ResourceReadResult, ResourceReadError> {
    if uri == CALCULATOR_SYNTHETIC_URI {
        return Ok(calculator_usage_error(uri));
    }

    if let Some(location) = uri.strip_prefix(WEATHER_SYNTHETIC_PREFIX) {
        return Ok(weather_read(manager, server, uri, location).await);
    }

    if let Some((owner, tool)) = parse_generic_uri(uri) {
        if owner == server {
            return describe_tool(manager, server, uri, tool);
        }
    }

    manager.read_native(server, uri).await
}

/// The calculator has no readable state; reading it always yields this error
/// body instead of a tool invocation.
fn calculator_usage_error(uri: &str) -> ResourceReadResult {
    let body = json!({
        "error": "This resource cannot be read directly.",
        "message": format!(
            "Call the '{}' tool with an expression to evaluate; the resource only advertises it.",
            CALCULATOR_TOOL
        ),
    });
    ResourceReadResult::single(ResourceContents::json(uri, &body))
}

async fn weather_read(
    manager: &mut ConnectionManager,
    server: &str,
    uri: &str,
    location: &str,
) -> ResourceReadResult {
    let payload = match probe_weather_tool(manager, server, location).await {
        Some(value) => value,
        None => weather_placeholder(location),
    };
    ResourceReadResult::single(ResourceContents::json(uri, &payload))
}

/// Calls the provider's `weather` tool under a short deadline. Any failure,
/// including the tool being absent entirely, yields `None` so the read can
/// fall back to the placeholder.
async fn probe_weather_tool(
    manager: &mut ConnectionManager,
    server: &str,
    location: &str,
) -> Option<Value> {
    let has_tool = manager
        .get(server)
        .map(|connection| connection.tools.iter().any(|tool| tool.name == WEATHER_TOOL))
        .unwrap_or(false);
    if !has_tool {
        debug!(server = %server, "No weather tool; serving placeholder");
        return None;
    }

    let mut arguments = Map::new();
    arguments.insert("location".to_string(), Value::String(location.to_string()));
    match manager
        .call_tool_with_timeout(server, WEATHER_TOOL, Some(arguments), WEATHER_PROBE_TIMEOUT)
        .await
    {
        Ok(outcome) if !outcome.is_error() => first_content_as_json(&outcome.content),
        Ok(_) => {
            debug!(server = %server, "Weather tool reported an error; serving placeholder");
            None
        }
        Err(err) => {
            warn!(server = %server, error = %err, "Weather tool call failed; serving placeholder");
            None
        }
    }
}

fn first_content_as_json(content: &[ContentBlock]) -> Option<Value> {
    let block = content.first()?;
    if let ContentBlock::TextContent(text) = block {
        if let Ok(value) = serde_json::from_str(&text.text) {
            return Some(value);
        }
    }
    serde_json::to_value(block).ok()
}

/// Deterministic stand-in served whenever the live tool cannot answer. The
/// location is percent-decoded here only; tool invocations receive it raw.
fn weather_placeholder(location: &str) -> Value {
    let display = urlencoding::decode(location)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| location.to_string());
    json!({
        "location": display,
        "temperature": 18,
        "unit": "celsius",
        "condition": "Partly cloudy",
        "forecast": [
            {"day": "Tomorrow", "condition": "Sunny", "high": 21, "low": 12},
            {"day": "Day 2", "condition": "Partly cloudy", "high": 19, "low": 11},
            {"day": "Day 3", "condition": "Light rain", "high": 17, "low": 10}
        ]
    })
}

/// Generic wrappers describe their tool instead of invoking it.
fn describe_tool(
    manager: &ConnectionManager,
    server: &str,
    uri: &str,
    tool: &str,
) -> Result<ResourceReadResult, ResourceReadError> {
    let connection =
        manager
            .get(server)
            .ok_or_else(|| ResourceReadError::ConnectionNotFound {
                server: server.to_string(),
            })?;
    let descriptor = connection
        .tools
        .iter()
        .find(|descriptor| descriptor.name == tool)
        .ok_or_else(|| ResourceReadError::ToolNotFound {
            server: server.to_string(),
            tool: tool.to_string(),
        })?;

    let body = json!({
        "tool": descriptor.name,
        "description": descriptor.description,
        "inputSchema": descriptor.input_schema,
        "outputSchema": descriptor.output_schema,
        "usage": format!(
            "Call the '{}' tool on server '{}' with arguments matching inputSchema; reading this resource only describes it.",
            descriptor.name, server
        ),
    });
    Ok(ResourceReadResult::single(ResourceContents::json(
        uri, &body,
    )))
}

/// Splits `mcp://{server}/synthetic/tool/{toolName}` into server and tool
/// name. URIs that do not fit the shape fall through to a native read.
fn parse_generic_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix(SYNTHETIC_URI_SCHEME)?;
    let (server, tool) = rest.split_once(SYNTHETIC_TOOL_INFIX)?;
    if server.is_empty() || tool.is_empty() {
        return None;
    }
    Some((server, tool))
}
