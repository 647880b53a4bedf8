//! Protocol client for a single MCP server.
//!
//! Wraps a transport with the initialize handshake, typed capability listing
//! calls, and tool/resource operations. The client is transport-agnostic;
//! stdio and HTTP servers behave identically above this layer.

use crate::mcp::transport::{
    format_rpc_error, is_method_not_found, parse_response, McpTransport, SendError,
};
use crate::mcp::types::{
    ResourceListing, ResourceReadResult, ResourceTemplateListing, ToolCallOutcome, ToolListing,
};
use rust_mcp_schema::schema_utils::{RequestFromClient, ServerMessage};
use rust_mcp_schema::{
    CallToolRequestParams, ClientCapabilities, Implementation, InitializeRequestParams,
    InitializeResult, PaginatedRequestParams, ReadResourceRequestParams, ServerCapabilities,
    LATEST_PROTOCOL_VERSION,
};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Why a tool or resource call failed, before server and tool names are
/// attached by the manager.
#[derive(Debug)]
pub(crate) enum CallFailure {
    Timeout { millis: u64 },
    Rpc(String),
    Invalid(String),
    Transport(String),
}

impl From<SendError> for CallFailure {
    fn from(err: SendError) -> Self {
        match err {
            SendError::TimedOut { millis } => CallFailure::Timeout { millis },
            SendError::Failed(message) => CallFailure::Transport(message),
        }
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallFailure::Timeout { millis } => write!(f, "Timed out after {} ms.", millis),
            CallFailure::Rpc(message)
            | CallFailure::Invalid(message)
            | CallFailure::Transport(message) => write!(f, "{}", message),
        }
    }
}

fn client_details() -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "switchboard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Switchboard MCP Client".to_string()),
            description: Some("Switchboard MCP connection manager".to_string()),
            icons: Vec::new(),
            website_url: Some("https://github.com/permacommons/switchboard".to_string()),
        },
        meta: None,
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
    }
}

fn paginated_params(cursor: Option<String>) -> Option<PaginatedRequestParams> {
    cursor.map(|cursor| PaginatedRequestParams {
        cursor: Some(cursor),
        meta: None,
    })
}

pub(crate) struct McpClient {
    server_name: String,
    transport: Box<dyn McpTransport>,
    default_timeout: Duration,
    server_details: Option<InitializeResult>,
}

impl McpClient {
    pub(crate) fn new(
        server_name: &str,
        transport: Box<dyn McpTransport>,
        default_timeout: Duration,
    ) -> Self {
        McpClient {
            server_name: server_name.to_string(),
            transport,
            default_timeout,
            server_details: None,
        }
    }

    /// Runs the initialize exchange and stores what the server reported.
    pub(crate) async fn handshake(&mut self) -> Result<(), String> {
        let details = self
            .transport
            .initialize(client_details(), self.default_timeout)
            .await?;
        debug!(
            server = %self.server_name,
            protocol_version = %details.protocol_version,
            "MCP handshake complete"
        );
        self.server_details = Some(details);
        Ok(())
    }

    pub(crate) fn server_details(&self) -> Option<&InitializeResult> {
        self.server_details.as_ref()
    }

    fn server_capabilities(&self) -> Option<&ServerCapabilities> {
        self.server_details
            .as_ref()
            .map(|details| &details.capabilities)
    }

    /// Servers predating capability blocks still serve tools.
    pub(crate) fn supports_tools(&self) -> bool {
        self.server_capabilities()
            .map(|caps| caps.tools.is_some())
            .unwrap_or(true)
    }

    /// Resource support is opt-in; absence means the server has none.
    pub(crate) fn supports_resources(&self) -> bool {
        self.server_capabilities()
            .map(|caps| caps.resources.is_some())
            .unwrap_or(false)
    }

    pub(crate) fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    async fn list_page<T: serde::de::DeserializeOwned>(
        &mut self,
        request: RequestFromClient,
    ) -> Result<Option<T>, String> {
        let response = self
            .transport
            .send_request(request, self.default_timeout)
            .await
            .map_err(|err| err.to_string())?;
        if is_method_not_found(&response) {
            return Ok(None);
        }
        parse_response::<T>(response).map(Some)
    }

    /// One page of the tool listing; `Ok(None)` means the server does not
    /// implement the method.
    pub(crate) async fn list_tools_page(
        &mut self,
        cursor: Option<String>,
    ) -> Result<Option<ToolListing>, String> {
        self.list_page(RequestFromClient::ListToolsRequest(paginated_params(
            cursor,
        )))
        .await
    }

    pub(crate) async fn list_resources_page(
        &mut self,
        cursor: Option<String>,
    ) -> Result<Option<ResourceListing>, String> {
        self.list_page(RequestFromClient::ListResourcesRequest(paginated_params(
            cursor,
        )))
        .await
    }

    pub(crate) async fn list_resource_templates_page(
        &mut self,
        cursor: Option<String>,
    ) -> Result<Option<ResourceTemplateListing>, String> {
        self.list_page(RequestFromClient::ListResourceTemplatesRequest(
            paginated_params(cursor),
        ))
        .await
    }

    pub(crate) async fn call_tool(
        &mut self,
        tool: &str,
        arguments: Option<Map<String, Value>>,
        timeout: Option<Duration>,
    ) -> Result<ToolCallOutcome, CallFailure> {
        let mut params = CallToolRequestParams::new(tool);
        if let Some(arguments) = arguments {
            params = params.with_arguments(arguments);
        }
        let effective = timeout.unwrap_or(self.default_timeout);
        debug!(
            server = %self.server_name,
            tool = %tool,
            timeout_ms = effective.as_millis() as u64,
            "Calling MCP tool"
        );
        let response = self
            .transport
            .send_request(RequestFromClient::CallToolRequest(params), effective)
            .await
            .map_err(CallFailure::from)?;
        match response {
            ServerMessage::Error(error) => Err(CallFailure::Rpc(format_rpc_error(&error.error))),
            message => parse_response::<ToolCallOutcome>(message).map_err(CallFailure::Invalid),
        }
    }

    pub(crate) async fn read_resource(
        &mut self,
        uri: &str,
    ) -> Result<ResourceReadResult, CallFailure> {
        let params = ReadResourceRequestParams {
            meta: None,
            uri: uri.to_string(),
        };
        debug!(server = %self.server_name, uri = %uri, "Reading MCP resource");
        let response = self
            .transport
            .send_request(
                RequestFromClient::ReadResourceRequest(params),
                self.default_timeout,
            )
            .await
            .map_err(CallFailure::from)?;
        match response {
            ServerMessage::Error(error) => Err(CallFailure::Rpc(format_rpc_error(&error.error))),
            message => parse_response::<ResourceReadResult>(message).map_err(CallFailure::Invalid),
        }
    }

    pub(crate) async fn close(&mut self) {
        self.transport.close().await;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn absent_capability_block_enables_tools_only() {
        let mut transport = ScriptedTransport::with_replies(Vec::new());
        transport.initialize_result = Some(plain_initialize_result());
        let mut client = McpClient::new("scripted", Box::new(transport), Duration::from_secs(5));

        client.handshake().await.expect("handshake");

        assert!(client.supports_tools());
        assert!(!client.supports_resources());
    }

    #[tokio::test]
    async fn list_page_treats_method_not_found_as_absent() {
        let mut client = client_with(vec![Ok(error(0, -32601, "Method not found"))]);
        let page = client.list_tools_page(None).await.expect("listing");
        assert!(page.is_none());
    }

    #[tokio::test]
    async fn list_page_parses_tools() {
        let mut client = client_with(vec![Ok(response(
            0,
            json!({"tools": [{"name": "calculator"}], "nextCursor": "p2"}),
        ))]);
        let page = client
            .list_tools_page(None)
            .await
            .expect("listing")
            .expect("page");
        assert_eq!(page.tools.len(), 1);
        assert_eq!(page.tools[0].name, "calculator");
        assert_eq!(page.next_cursor.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn call_tool_classifies_rpc_errors() {
        let mut client = client_with(vec![Ok(error(0, -32000, "tool exploded"))]);
        let err = client
            .call_tool("calculator", None, None)
            .await
            .expect_err("expected rpc error");
        match err {
            CallFailure::Rpc(message) => assert!(message.contains("MCP error -32000")),
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn call_tool_keeps_timeouts_distinct() {
        let mut client = client_with(vec![Err(SendError::TimedOut { millis: 5000 })]);
        let err = client
            .call_tool("get_weather", None, Some(Duration::from_secs(5)))
            .await
            .expect_err("expected timeout");
        assert!(matches!(err, CallFailure::Timeout { millis: 5000 }));
    }

    #[tokio::test]
    async fn call_tool_parses_content() {
        let mut client = client_with(vec![Ok(response(
            0,
            json!({"content": [{"type": "text", "text": "4"}]}),
        ))]);
        let outcome = client
            .call_tool("calculator", None, None)
            .await
            .expect("outcome");
        assert_eq!(outcome.first_text(), Some("4"));
        assert!(!outcome.is_error());
    }

    #[tokio::test]
    async fn call_tool_flags_malformed_results() {
        let mut client = client_with(vec![Ok(response(0, json!({"content": "not-a-list"})))]);
        let err = client
            .call_tool("calculator", None, None)
            .await
            .expect_err("expected invalid result");
        assert!(matches!(err, CallFailure::Invalid(_)));
    }
}
