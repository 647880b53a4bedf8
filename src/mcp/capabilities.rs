//! Capability discovery for connected servers.
//!
//! Listings follow `nextCursor` pagination up to a fixed total cap. A server
//! that answers method-not-found simply lacks that capability; a failed fetch
//! degrades to an empty list with a warning so one bad listing never takes a
//! connection down.

use crate::mcp::client::McpClient;
use crate::mcp::transport::CapabilityFetch;
use crate::mcp::types::{ResourceDescriptor, ResourceTemplateDescriptor, ToolDescriptor};
use tracing::{debug, warn};

pub(crate) const MCP_MAX_LIST: usize = 100;

macro_rules! paginate_listing {
    ($client:expr, $page:ident, $items:ident) => {{
        match $client.$page(None).await {
            Ok(Some(mut listing)) => {
                let mut items = std::mem::take(&mut listing.$items);
                let mut next_cursor = listing.next_cursor.take();
                let mut error: Option<String> = None;

                if items.len() >= MCP_MAX_LIST {
                    items.truncate(MCP_MAX_LIST);
                } else {
                    while let Some(cursor) = next_cursor.clone() {
                        match $client.$page(Some(cursor)).await {
                            Ok(Some(mut page)) => {
                                items.append(&mut page.$items);
                                next_cursor = page.next_cursor.take();
                                if items.len() >= MCP_MAX_LIST {
                                    items.truncate(MCP_MAX_LIST);
                                    break;
                                }
                            }
                            Ok(None) => {
                                next_cursor = None;
                                break;
                            }
                            Err(message) => {
                                error = Some(message);
                                break;
                            }
                        }
                    }
                }

                match error {
                    Some(message) => CapabilityFetch::Failed(message),
                    None => CapabilityFetch::Fetched(items),
                }
            }
            Ok(None) => CapabilityFetch::Unsupported,
            Err(message) => CapabilityFetch::Failed(message),
        }
    }};
}

pub(crate) async fn fetch_tools(client: &mut McpClient) -> CapabilityFetch<Vec<ToolDescriptor>> {
    if !client.supports_tools() {
        return CapabilityFetch::Unsupported;
    }
    paginate_listing!(client, list_tools_page, tools)
}

pub(crate) async fn fetch_resources(
    client: &mut McpClient,
) -> CapabilityFetch<Vec<ResourceDescriptor>> {
    if !client.supports_resources() {
        return CapabilityFetch::Unsupported;
    }
    paginate_listing!(client, list_resources_page, resources)
}

pub(crate) async fn fetch_resource_templates(
    client: &mut McpClient,
) -> CapabilityFetch<Vec<ResourceTemplateDescriptor>> {
    if !client.supports_resources() {
        return CapabilityFetch::Unsupported;
    }
    paginate_listing!(client, list_resource_templates_page, resource_templates)
}

/// Everything discovered from one server, failures already folded to empty
/// lists. Warnings carry the listing failures for the connection's error log.
#[derive(Debug, Default)]
pub(crate) struct FetchedCapabilities {
    pub(crate) tools: Vec<ToolDescriptor>,
    pub(crate) resources: Vec<ResourceDescriptor>,
    pub(crate) resource_templates: Vec<ResourceTemplateDescriptor>,
    pub(crate) warnings: Vec<String>,
}

pub(crate) async fn fetch_all(server: &str, client: &mut McpClient) -> FetchedCapabilities {
    let mut warnings = Vec::new();
    let tools = apply_fetch(server, "tools", fetch_tools(client).await, &mut warnings);
    let resources = apply_fetch(
        server,
        "resources",
        fetch_resources(client).await,
        &mut warnings,
    );
    let resource_templates = apply_fetch(
        server,
        "resource templates",
        fetch_resource_templates(client).await,
        &mut warnings,
    );
    FetchedCapabilities {
        tools,
        resources,
        resource_templates,
        warnings,
    }
}

fn apply_fetch<T>(
    server: &str,
    label: &str,
    fetch: CapabilityFetch<Vec<T>>,
    warnings: &mut Vec<String>,
) -> Vec<T> {
    match fetch {
        CapabilityFetch::Fetched(items) => {
            debug!(server = %server, listing = %label, count = items.len(), "Fetched MCP listing");
            items
        }
        CapabilityFetch::Unsupported => {
            debug!(server = %server, listing = %label, "MCP listing unsupported");
            Vec::new()
        }
        CapabilityFetch::Failed(message) => {
            warn!(server = %server, listing = %label, error = %message, "MCP listing failed");
            warnings.push(format!("{} listing failed: {}", label, message));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::testing::{client_with, error, response};
    use crate::mcp::transport::SendError;
    use serde_json::json;

    #[tokio::test]
    async fn pagination_follows_cursors() {
        let mut client = client_with(vec![
            Ok(response(
                0,
                json!({"tools": [{"name": "alpha"}], "nextCursor": "p2"}),
            )),
            Ok(response(1, json!({"tools": [{"name": "beta"}]}))),
        ]);

        let fetch = fetch_tools(&mut client).await;
        match fetch {
            CapabilityFetch::Fetched(tools) => {
                let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
                assert_eq!(names, vec!["alpha", "beta"]);
            }
            other => panic!("unexpected fetch outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn pagination_stops_at_the_cap() {
        let tools: Vec<serde_json::Value> = (0..MCP_MAX_LIST + 20)
            .map(|index| json!({"name": format!("tool_{index}")}))
            .collect();
        let mut client = client_with(vec![Ok(response(
            0,
            json!({"tools": tools, "nextCursor": "more"}),
        ))]);

        let fetch = fetch_tools(&mut client).await;
        match fetch {
            CapabilityFetch::Fetched(tools) => assert_eq!(tools.len(), MCP_MAX_LIST),
            other => panic!("unexpected fetch outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn mid_pagination_failure_reports_the_error() {
        let mut client = client_with(vec![
            Ok(response(
                0,
                json!({"tools": [{"name": "alpha"}], "nextCursor": "p2"}),
            )),
            Err(SendError::Failed("connection reset".to_string())),
        ]);

        let fetch = fetch_tools(&mut client).await;
        match fetch {
            CapabilityFetch::Failed(message) => assert!(message.contains("connection reset")),
            other => panic!("unexpected fetch outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn resources_skipped_without_capability() {
        // No handshake ran, so the server never advertised resources.
        let mut client = client_with(vec![Ok(response(0, json!({"resources": []})))]);

        let fetch = fetch_resources(&mut client).await;
        assert!(matches!(fetch, CapabilityFetch::Unsupported));
    }

    #[tokio::test]
    async fn method_not_found_marks_capability_absent() {
        let mut client = client_with(vec![Ok(error(0, -32601, "Method not found"))]);
        let fetch = fetch_tools(&mut client).await;
        assert!(matches!(fetch, CapabilityFetch::Unsupported));
    }

    #[tokio::test]
    async fn fetch_all_degrades_failures_to_empty_lists() {
        let mut client = client_with(vec![Err(SendError::Failed("boom".to_string()))]);

        let fetched = fetch_all("alpha", &mut client).await;

        assert!(fetched.tools.is_empty());
        assert!(fetched.resources.is_empty());
        assert_eq!(fetched.warnings.len(), 1);
        assert!(fetched.warnings[0].starts_with("tools listing failed:"));
    }
}
